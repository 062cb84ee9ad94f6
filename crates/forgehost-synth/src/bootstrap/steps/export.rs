// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Environment export step emitter.

use super::super::EmitContext;

/// Export every variable for the bootstrap process, then persist the same
/// lines to the service user's profile for cron jobs.
pub fn emit(ctx: &EmitContext<'_>) -> Vec<String> {
    let mut commands = ctx.environment.export_lines();
    commands.extend(ctx.environment.persist_commands(&ctx.layout.profile));
    commands
}
