// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Package installation and directory preparation.
//!
//! Both steps are unconditional and safe to re-run.

use super::super::EmitContext;
use crate::shell::{quote, quote_path};

pub fn install_packages(ctx: &EmitContext<'_>) -> Vec<String> {
    if ctx.layout.packages.is_empty() {
        return Vec::new();
    }
    let packages: Vec<String> = ctx.layout.packages.iter().map(|p| quote(p)).collect();
    vec![format!("sudo yum install -y {}", packages.join(" "))]
}

/// Create the config, helper and server directories, give them to the service
/// user, and make the server directory the working directory.
pub fn prepare_directories(ctx: &EmitContext<'_>) -> Vec<String> {
    let layout = ctx.layout;
    let owner = quote(&format!("{0}:{0}", layout.user));

    let mut commands: Vec<String> = [&layout.config_dir, &layout.bin_dir, &layout.server_dir]
        .iter()
        .map(|dir| format!("sudo mkdir -p {}", quote_path(dir)))
        .collect();
    for dir in [&layout.config_dir, &layout.server_dir] {
        commands.push(format!("sudo chown -R {} {}", owner, quote_path(dir)));
    }
    commands.push(format!("cd {}", quote_path(&layout.server_dir)));
    commands
}
