// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Synthesizer configuration.

use std::env;
use std::path::PathBuf;

use crate::bootstrap::cron::Schedule;

/// Default backup cadence: every fifteen minutes.
pub const DEFAULT_BACKUP_SCHEDULE: &str = "*/15 * * * *";

/// Synthesizer configuration loaded from environment variables.
///
/// These settings are operator concerns (where assets are staged, how often
/// backups run). Everything that describes the deployment itself lives in the
/// [`DeploymentSpec`](forgehost_dsl::DeploymentSpec).
#[derive(Debug, Clone)]
pub struct SynthConfig {
    /// Prefix for stack names and generated bucket names (default: "forgehost")
    pub app_name: String,
    /// Bucket published assets are staged in (default: "forgehost-assets")
    pub staging_bucket: String,
    /// Directory holding the backup/restore/setup helper scripts (default: "resources")
    pub resources_dir: PathBuf,
    /// Cron schedule of the backup job (default: "*/15 * * * *")
    pub backup_schedule: String,
    /// Compute instance type (default: "t3.medium")
    pub instance_type: String,
    /// Directory the assembly is written to (default: "forgehost.out")
    pub output_dir: PathBuf,
}

impl SynthConfig {
    /// Load configuration from environment variables.
    ///
    /// # Optional Environment Variables
    /// - `FORGEHOST_APP_NAME` - Stack/bucket name prefix (default: "forgehost")
    /// - `FORGEHOST_STAGING_BUCKET` - Asset staging bucket (default: "forgehost-assets")
    /// - `FORGEHOST_RESOURCES_DIR` - Helper script directory (default: "resources")
    /// - `FORGEHOST_BACKUP_SCHEDULE` - Backup cron schedule (default: "*/15 * * * *")
    /// - `FORGEHOST_INSTANCE_TYPE` - Instance type (default: "t3.medium")
    /// - `FORGEHOST_OUTPUT_DIR` - Assembly output directory (default: "forgehost.out")
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let app_name = env::var("FORGEHOST_APP_NAME").unwrap_or(defaults.app_name);
        if !is_name_prefix(&app_name) {
            return Err(ConfigError::InvalidValue {
                var: "FORGEHOST_APP_NAME",
                reason: format!(
                    "'{}' must be lowercase letters, digits and '-', starting with a letter",
                    app_name
                ),
            });
        }

        let staging_bucket =
            env::var("FORGEHOST_STAGING_BUCKET").unwrap_or(defaults.staging_bucket);
        if staging_bucket.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                var: "FORGEHOST_STAGING_BUCKET",
                reason: "must not be empty".to_string(),
            });
        }

        let resources_dir = env::var("FORGEHOST_RESOURCES_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.resources_dir);

        let backup_schedule =
            env::var("FORGEHOST_BACKUP_SCHEDULE").unwrap_or(defaults.backup_schedule);
        Schedule::parse(&backup_schedule).map_err(|e| ConfigError::InvalidValue {
            var: "FORGEHOST_BACKUP_SCHEDULE",
            reason: e.to_string(),
        })?;

        let instance_type = env::var("FORGEHOST_INSTANCE_TYPE").unwrap_or(defaults.instance_type);

        let output_dir = env::var("FORGEHOST_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        Ok(Self {
            app_name,
            staging_bucket,
            resources_dir,
            backup_schedule,
            instance_type,
            output_dir,
        })
    }

    /// Set the stack/bucket name prefix.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Set the asset staging bucket.
    pub fn with_staging_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.staging_bucket = bucket.into();
        self
    }

    /// Set the helper script directory.
    pub fn with_resources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resources_dir = dir.into();
        self
    }

    /// Set the backup cron schedule.
    pub fn with_backup_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.backup_schedule = schedule.into();
        self
    }

    /// Set the assembly output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            app_name: "forgehost".to_string(),
            staging_bucket: "forgehost-assets".to_string(),
            resources_dir: PathBuf::from("resources"),
            backup_schedule: DEFAULT_BACKUP_SCHEDULE.to_string(),
            instance_type: "t3.medium".to_string(),
            output_dir: PathBuf::from("forgehost.out"),
        }
    }
}

fn is_name_prefix(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable holds an unusable value.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}
