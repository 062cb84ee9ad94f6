// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shell quoting for generated bootstrap commands.
//!
//! Every value interpolated into a command (bucket names, versions, paths,
//! cron lines) goes through [`quote`]. Values made only of safe characters are
//! left bare so the common case stays readable.

use std::borrow::Cow;
use std::path::Path;

use shell_escape::unix::escape;

/// Quote a string for POSIX shell interpolation.
pub fn quote(value: &str) -> String {
    escape(Cow::Borrowed(value)).into_owned()
}

/// Quote a path for POSIX shell interpolation.
pub fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}

/// Run `command` as `user` via sudo.
pub fn as_user(user: &str, command: &str) -> String {
    format!("sudo -u {} {}", quote(user), command)
}
