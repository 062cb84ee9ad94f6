// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Asset download step emitters.
//!
//! Downloads overwrite their target, archive expansion overwrites existing
//! files and cleanup tolerates a missing archive, so every block can run again
//! after a partial boot.

use std::path::Path;

use super::super::{ComposeError, EmitContext, HELPER_SCRIPTS};
use crate::assets::AssetRef;
use crate::shell::{quote, quote_path};

/// Copy `asset` to its target path, creating the parent directory first.
pub fn download_command(asset: &AssetRef) -> String {
    let target = Path::new(&asset.local_target_path);
    let copy = format!(
        "aws s3 cp {} {}",
        quote(&asset.object_url()),
        quote_path(target)
    );
    match target.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => format!("mkdir -p {} && {}", quote_path(parent), copy),
        None => copy,
    }
}

pub fn server_config(ctx: &EmitContext<'_>) -> Result<Vec<String>, ComposeError> {
    let asset = ctx
        .assets
        .server_config
        .as_ref()
        .ok_or_else(|| ComposeError::MissingAsset("server config overlay".to_string()))?;
    Ok(vec![download_command(asset)])
}

/// Download the archive, expand it into the server directory, then remove it.
pub fn mods_archive(ctx: &EmitContext<'_>) -> Result<Vec<String>, ComposeError> {
    let asset = ctx
        .assets
        .mods_archive
        .as_ref()
        .ok_or_else(|| ComposeError::MissingAsset("mods archive".to_string()))?;
    let archive = quote(&asset.local_target_path);
    Ok(vec![
        download_command(asset),
        format!(
            "unzip -o {} -d {}",
            archive,
            quote_path(&ctx.layout.server_dir)
        ),
        format!("rm -f {}", archive),
    ])
}

pub fn service_descriptor(ctx: &EmitContext<'_>) -> Result<Vec<String>, ComposeError> {
    let asset = ctx
        .assets
        .service_descriptor
        .as_ref()
        .ok_or_else(|| ComposeError::MissingAsset("server descriptor".to_string()))?;
    Ok(vec![download_command(asset)])
}

/// Download every helper, then one ownership and permission pass over the
/// helper directory.
pub fn helper_scripts(ctx: &EmitContext<'_>) -> Result<Vec<String>, ComposeError> {
    let mut commands = HELPER_SCRIPTS
        .iter()
        .map(|name| ctx.helper(name).map(download_command))
        .collect::<Result<Vec<_>, _>>()?;

    let bin_dir = quote_path(&ctx.layout.bin_dir);
    commands.push(format!(
        "sudo chown -R {} {}",
        quote(&format!("{0}:{0}", ctx.layout.user)),
        bin_dir
    ));
    commands.push(format!("sudo chmod -R 755 {}", bin_dir));
    Ok(commands)
}
