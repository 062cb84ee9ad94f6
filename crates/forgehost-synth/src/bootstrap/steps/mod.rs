// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Step emitters for bootstrap composition.
//!
//! Each step has its own emitter producing the shell commands for that step.
//! [`PLAN`] fixes the order; [`StepEmitter::applies`] decides whether a step
//! is part of a given deployment.

pub mod base;
pub mod downloads;
pub mod export;
pub mod schedule;

use serde::Serialize;
use strum::Display;

use super::{ComposeError, EmitContext};
use forgehost_dsl::DeploymentSpec;

/// A block of the bootstrap script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum BootstrapStep {
    /// Export the published environment and persist it to the user profile.
    ExportEnvironment,
    InstallPackages,
    /// Create the server directories, hand them to the service user and enter
    /// the server directory.
    PrepareDirectories,
    /// Download the server configuration overlay.
    DownloadServerConfig,
    /// Download, expand and remove the mods archive.
    InstallModsArchive,
    DownloadServiceDescriptor,
    /// Download the helper scripts and normalize their ownership and mode.
    InstallHelperScripts,
    RegisterBackupJob,
    RunSetup,
}

/// Every step, in script order.
pub const PLAN: &[BootstrapStep] = &[
    BootstrapStep::ExportEnvironment,
    BootstrapStep::InstallPackages,
    BootstrapStep::PrepareDirectories,
    BootstrapStep::DownloadServerConfig,
    BootstrapStep::InstallModsArchive,
    BootstrapStep::DownloadServiceDescriptor,
    BootstrapStep::InstallHelperScripts,
    BootstrapStep::RegisterBackupJob,
    BootstrapStep::RunSetup,
];

/// Trait for emitting the commands of a bootstrap step.
pub trait StepEmitter {
    /// Whether the step is part of the script for `spec`.
    fn applies(&self, spec: &DeploymentSpec) -> bool;

    /// Emit the step's commands.
    fn emit(&self, ctx: &EmitContext<'_>) -> Result<Vec<String>, ComposeError>;
}

impl StepEmitter for BootstrapStep {
    fn applies(&self, spec: &DeploymentSpec) -> bool {
        match self {
            BootstrapStep::DownloadServerConfig => spec.has_server_config(),
            BootstrapStep::InstallModsArchive => spec.has_mods_archive(),
            _ => true,
        }
    }

    fn emit(&self, ctx: &EmitContext<'_>) -> Result<Vec<String>, ComposeError> {
        match self {
            BootstrapStep::ExportEnvironment => Ok(export::emit(ctx)),
            BootstrapStep::InstallPackages => Ok(base::install_packages(ctx)),
            BootstrapStep::PrepareDirectories => Ok(base::prepare_directories(ctx)),
            BootstrapStep::DownloadServerConfig => downloads::server_config(ctx),
            BootstrapStep::InstallModsArchive => downloads::mods_archive(ctx),
            BootstrapStep::DownloadServiceDescriptor => downloads::service_descriptor(ctx),
            BootstrapStep::InstallHelperScripts => downloads::helper_scripts(ctx),
            BootstrapStep::RegisterBackupJob => Ok(schedule::register_jobs(ctx)),
            BootstrapStep::RunSetup => schedule::run_setup(ctx),
        }
    }
}
