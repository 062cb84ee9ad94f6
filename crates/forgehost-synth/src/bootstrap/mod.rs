// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bootstrap script composition.
//!
//! Turns a deployment spec and its published assets into the ordered list of
//! shell commands the instance runs once on first boot. The order is fixed by
//! [`steps::PLAN`]; each step carries a predicate over the spec and is skipped
//! entirely when it does not apply, so optional inputs never leave no-op
//! commands behind.
//!
//! Composition is pure: no I/O, no global state. The same input always yields
//! the same commands.

pub mod cron;
pub mod environment;
pub mod render;
pub mod steps;

use std::ops::Range;
use std::path::{Path, PathBuf};

use forgehost_dsl::DeploymentSpec;

use crate::assets::AssetRef;
use cron::{CronError, CronJob, CronTable, Schedule};
use environment::PublishedEnvironment;
use steps::{BootstrapStep, PLAN, StepEmitter};

/// Environment variable carrying the backup bucket name.
pub const BACKUP_BUCKET_VAR: &str = "AWS_BACKUP_BUCKET";

/// Environment variable carrying the package version.
pub const PACKAGE_VERSION_VAR: &str = "FORGE_VERSION";

/// Helper scripts downloaded into the helper directory, in download order.
pub const HELPER_SCRIPTS: &[&str] = &["backup.sh", "download_previous.sh", "setup.sh"];

/// Helper run by the backup cron job.
pub const BACKUP_SCRIPT: &str = "backup.sh";

/// Helper invoked last to finish setting up the server.
pub const SETUP_SCRIPT: &str = "setup.sh";

/// Composition errors.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// A step needs an asset that was not resolved.
    #[error("Missing asset for {0}")]
    MissingAsset(String),

    /// The backup schedule or job is malformed.
    #[error("Invalid backup schedule: {0}")]
    InvalidSchedule(#[from] CronError),

    /// An environment variable cannot be published.
    #[error("Invalid environment variable '{key}': {reason}")]
    InvalidEnvironment { key: String, reason: String },

    /// Rendering the user-data document failed.
    #[error("Failed to render user data: {0}")]
    Render(#[from] minijinja::Error),
}

// ============================================================================
// Inputs
// ============================================================================

/// Where things live on the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceLayout {
    /// User owning the server files and the cron jobs.
    pub user: String,
    /// Profile file sourced by the user's login shells and cron jobs.
    pub profile: PathBuf,
    /// Packages installed before anything else.
    pub packages: Vec<String>,
    pub config_dir: PathBuf,
    /// Helper script directory.
    pub bin_dir: PathBuf,
    /// Server working directory.
    pub server_dir: PathBuf,
    pub service_descriptor: PathBuf,
}

impl Default for InstanceLayout {
    fn default() -> Self {
        Self {
            user: "ec2-user".to_string(),
            profile: PathBuf::from("/home/ec2-user/.bash_profile"),
            packages: vec!["java-11-amazon-corretto".to_string()],
            config_dir: PathBuf::from("/minecraft_config"),
            bin_dir: PathBuf::from("/minecraft_config/bin"),
            server_dir: PathBuf::from("/minecraft"),
            service_descriptor: PathBuf::from("/etc/systemd/system/minecraft.service"),
        }
    }
}

impl InstanceLayout {
    /// Target of the server configuration overlay.
    pub fn server_config_target(&self) -> PathBuf {
        self.server_dir.join("server.properties")
    }

    /// Target of the mods archive before expansion.
    pub fn mods_archive_target(&self) -> PathBuf {
        self.server_dir.join("mods.zip")
    }

    /// Target of a helper script.
    pub fn helper_target(&self, name: &str) -> PathBuf {
        self.bin_dir.join(name)
    }
}

/// Published assets the script downloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAssets {
    pub server_config: Option<AssetRef>,
    pub mods_archive: Option<AssetRef>,
    pub service_descriptor: Option<AssetRef>,
    /// Helper scripts in download order.
    pub helpers: Vec<AssetRef>,
}

impl ResolvedAssets {
    /// Every asset, in the order the script downloads them.
    pub fn all(&self) -> impl Iterator<Item = &AssetRef> {
        self.server_config
            .iter()
            .chain(self.mods_archive.iter())
            .chain(self.service_descriptor.iter())
            .chain(self.helpers.iter())
    }

    fn helper(&self, target: &Path) -> Option<&AssetRef> {
        self.helpers
            .iter()
            .find(|asset| Path::new(&asset.local_target_path) == target)
    }
}

/// Everything composition depends on.
#[derive(Debug, Clone)]
pub struct ComposeInput<'a> {
    pub spec: &'a DeploymentSpec,
    /// Resolved backup bucket name.
    pub bucket_name: &'a str,
    pub assets: &'a ResolvedAssets,
    pub layout: &'a InstanceLayout,
    pub backup_schedule: &'a str,
}

/// State shared by the step emitters during one composition.
#[derive(Debug)]
pub struct EmitContext<'a> {
    pub spec: &'a DeploymentSpec,
    pub assets: &'a ResolvedAssets,
    pub layout: &'a InstanceLayout,
    pub environment: PublishedEnvironment,
    pub cron: CronTable,
}

impl<'a> EmitContext<'a> {
    /// Validate the input and build the environment and cron table.
    fn prepare(input: &ComposeInput<'a>) -> Result<Self, ComposeError> {
        let mut environment = PublishedEnvironment::new();
        environment.set(BACKUP_BUCKET_VAR, input.bucket_name)?;
        environment.set(PACKAGE_VERSION_VAR, &input.spec.package_version)?;

        let schedule = Schedule::parse(input.backup_schedule)?;
        let backup_script = input.layout.helper_target(BACKUP_SCRIPT);
        let mut cron = CronTable::new();
        cron.register(CronJob::new(
            schedule,
            backup_script.to_string_lossy().into_owned(),
        )?);

        Ok(Self {
            spec: input.spec,
            assets: input.assets,
            layout: input.layout,
            environment,
            cron,
        })
    }

    /// The helper asset downloaded to `name` in the helper directory.
    pub fn helper(&self, name: &str) -> Result<&'a AssetRef, ComposeError> {
        let assets: &'a ResolvedAssets = self.assets;
        assets
            .helper(&self.layout.helper_target(name))
            .ok_or_else(|| ComposeError::MissingAsset(format!("helper script {}", name)))
    }
}

// ============================================================================
// Script
// ============================================================================

/// Ordered first-boot commands, grouped by the step that emitted them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapScript {
    commands: Vec<String>,
    sections: Vec<(BootstrapStep, Range<usize>)>,
}

impl BootstrapScript {
    /// Script made of raw commands, without step sections.
    pub fn from_commands(commands: Vec<String>) -> Self {
        Self {
            commands,
            sections: Vec::new(),
        }
    }

    fn append(&mut self, step: BootstrapStep, commands: Vec<String>) {
        let start = self.commands.len();
        self.commands.extend(commands);
        self.sections.push((step, start..self.commands.len()));
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Commands emitted by `step`, if it ran.
    pub fn section(&self, step: BootstrapStep) -> Option<&[String]> {
        self.sections
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, range)| &self.commands[range.clone()])
    }

    /// Steps that ran, in order.
    pub fn steps(&self) -> Vec<BootstrapStep> {
        self.sections.iter().map(|(step, _)| *step).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Compose the first-boot script for `input`.
pub fn compose(input: &ComposeInput<'_>) -> Result<BootstrapScript, ComposeError> {
    let ctx = EmitContext::prepare(input)?;
    let mut script = BootstrapScript::default();

    for step in PLAN {
        if !step.applies(ctx.spec) {
            tracing::debug!(step = %step, "Skipping bootstrap step");
            continue;
        }
        let commands = step.emit(&ctx)?;
        tracing::debug!(step = %step, commands = commands.len(), "Composed bootstrap step");
        script.append(*step, commands);
    }

    Ok(script)
}
