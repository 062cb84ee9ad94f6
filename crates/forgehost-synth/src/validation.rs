// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment spec validation.
//!
//! Runs before any resource is declared, so a malformed spec fails synthesis
//! without touching the graph. Errors fail synthesis; warnings describe
//! operational caveats of a valid deployment.

use forgehost_dsl::DeploymentSpec;

use crate::bootstrap::cron::Schedule;
use crate::config::SynthConfig;
use crate::storage::{resolve_bucket_name, validate_bucket_name};

// ============================================================================
// Validation Result Types
// ============================================================================

/// Result of spec validation containing errors and warnings.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Hard errors that prevent synthesis.
    pub errors: Vec<ValidationError>,
    /// Caveats of a deployment that is otherwise valid.
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are allowed).
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Errors, one per line.
    pub fn error_report(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Validation Errors
// ============================================================================

/// Errors that make a spec unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ValidationError {
    /// Package version is empty.
    EmptyPackageVersion,
    /// Package version does not look like a version string.
    InvalidPackageVersion { version: String },
    /// Server descriptor path is empty.
    EmptyDescriptorPath,
    /// Explicit bucket name violates naming rules.
    InvalidBucketName { name: String, reason: String },
    /// Backup schedule cannot be parsed.
    InvalidSchedule { schedule: String, reason: String },
    /// SSH key name is present but blank.
    BlankSshKeyName,
    /// Floating IP name is not an identifier.
    InvalidFloatingIpName { name: String },
    /// An optional path is present but blank.
    BlankOptionalPath { field: &'static str },
}

impl ValidationError {
    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::EmptyPackageVersion => "E001",
            ValidationError::InvalidPackageVersion { .. } => "E002",
            ValidationError::EmptyDescriptorPath => "E003",
            ValidationError::InvalidBucketName { .. } => "E004",
            ValidationError::InvalidSchedule { .. } => "E005",
            ValidationError::BlankSshKeyName => "E006",
            ValidationError::InvalidFloatingIpName { .. } => "E007",
            ValidationError::BlankOptionalPath { .. } => "E008",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.code();
        match self {
            ValidationError::EmptyPackageVersion => {
                write!(f, "[{}] Package version must not be empty", code)
            }
            ValidationError::InvalidPackageVersion { version } => {
                write!(
                    f,
                    "[{}] Package version '{}' must start with a digit and contain only letters, digits, '.', '+' and '-'",
                    code, version
                )
            }
            ValidationError::EmptyDescriptorPath => {
                write!(f, "[{}] Server descriptor path must not be empty", code)
            }
            ValidationError::InvalidBucketName { name, reason } => {
                write!(f, "[{}] Bucket name '{}' {}", code, name, reason)
            }
            ValidationError::InvalidSchedule { schedule, reason } => {
                write!(f, "[{}] Backup schedule '{}' is invalid: {}", code, schedule, reason)
            }
            ValidationError::BlankSshKeyName => {
                write!(
                    f,
                    "[{}] SSH key name is blank. Omit it to launch without a key",
                    code
                )
            }
            ValidationError::InvalidFloatingIpName { name } => {
                write!(
                    f,
                    "[{}] Floating IP name '{}' must start with a letter and contain only letters, digits, spaces, '-' and '_'",
                    code, name
                )
            }
            ValidationError::BlankOptionalPath { field } => {
                write!(f, "[{}] '{}' is blank. Omit it to skip that step", code, field)
            }
        }
    }
}

// ============================================================================
// Validation Warnings
// ============================================================================

/// Caveats of a valid spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// No SSH key: the instance cannot be reached for administration.
    NoSshKey,
    /// No floating IP: the endpoint changes whenever the instance is replaced.
    EphemeralEndpoint,
}

impl ValidationWarning {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationWarning::NoSshKey => "W001",
            ValidationWarning::EphemeralEndpoint => "W002",
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::NoSshKey => write!(
                f,
                "[{}] No SSH key name given. The instance will not accept SSH logins",
                self.code()
            ),
            ValidationWarning::EphemeralEndpoint => write!(
                f,
                "[{}] No floating IP given. The reported endpoint is the instance's own address and changes whenever the instance is replaced",
                self.code()
            ),
        }
    }
}

// ============================================================================
// Main Validation Function
// ============================================================================

/// Validate a deployment spec together with the synthesizer configuration.
pub fn validate_spec(spec: &DeploymentSpec, config: &SynthConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    validate_version(spec, &mut result);
    validate_paths(spec, &mut result);
    validate_names(spec, config, &mut result);

    if let Err(e) = Schedule::parse(&config.backup_schedule) {
        result.errors.push(ValidationError::InvalidSchedule {
            schedule: config.backup_schedule.clone(),
            reason: e.to_string(),
        });
    }

    if spec.ssh_key_name.is_none() {
        result.warnings.push(ValidationWarning::NoSshKey);
    }
    if !spec.has_floating_ip() {
        result.warnings.push(ValidationWarning::EphemeralEndpoint);
    }

    result
}

fn validate_version(spec: &DeploymentSpec, result: &mut ValidationResult) {
    let version = spec.package_version.as_str();
    if version.trim().is_empty() {
        result.errors.push(ValidationError::EmptyPackageVersion);
        return;
    }
    let mut chars = version.chars();
    let starts_with_digit = chars.next().is_some_and(|c| c.is_ascii_digit());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'));
    if !(starts_with_digit && rest_ok) {
        result.errors.push(ValidationError::InvalidPackageVersion {
            version: version.to_string(),
        });
    }
}

fn validate_paths(spec: &DeploymentSpec, result: &mut ValidationResult) {
    if spec.server_descriptor_path.trim().is_empty() {
        result.errors.push(ValidationError::EmptyDescriptorPath);
    }

    let optional = [
        ("modsArchivePath", spec.mods_archive_path.as_deref()),
        ("serverConfigPath", spec.server_config_path.as_deref()),
    ];
    for (field, path) in optional {
        if path.is_some_and(|p| p.trim().is_empty()) {
            result.errors.push(ValidationError::BlankOptionalPath { field });
        }
    }
}

fn validate_names(spec: &DeploymentSpec, config: &SynthConfig, result: &mut ValidationResult) {
    // A generated name inherits whatever the app name contains.
    let bucket_name = resolve_bucket_name(spec.bucket_name.as_deref(), &config.app_name);
    if let Err(reason) = validate_bucket_name(&bucket_name) {
        result.errors.push(ValidationError::InvalidBucketName {
            name: bucket_name,
            reason,
        });
    }

    if spec
        .ssh_key_name
        .as_deref()
        .is_some_and(|k| k.trim().is_empty())
    {
        result.errors.push(ValidationError::BlankSshKeyName);
    }

    if let Some(floating_ip) = &spec.floating_ip {
        if !is_identifier(&floating_ip.name) {
            result.errors.push(ValidationError::InvalidFloatingIpName {
                name: floating_ip.name.clone(),
            });
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
}
