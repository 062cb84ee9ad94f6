// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cron registration and the final setup invocation.

use super::super::{ComposeError, EmitContext, SETUP_SCRIPT};
use crate::shell::quote;

/// One check-then-append install command per registered job.
pub fn register_jobs(ctx: &EmitContext<'_>) -> Vec<String> {
    ctx.cron.install_commands(&ctx.layout.user)
}

/// Run the setup helper. It is downloaded by the helper step, so a missing
/// helper asset is a composition error.
pub fn run_setup(ctx: &EmitContext<'_>) -> Result<Vec<String>, ComposeError> {
    let setup = ctx.helper(SETUP_SCRIPT)?;
    Ok(vec![quote(&setup.local_target_path)])
}
