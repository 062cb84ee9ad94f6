// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment spec types.
//!
//! These types are the declarative surface of a forgehost deployment. They are
//! deserialized from the user's JSON spec, consumed by the synthesizer, and
//! exported as JSON Schema for editors.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// DSL version - bump when making breaking changes
pub const DSL_VERSION: &str = "1.0.0";

// ============================================================================
// Root Types
// ============================================================================

/// Declarative description of a single game server deployment.
///
/// `package_version` and `server_descriptor_path` are always required. Every
/// other field is optional, and each one toggles exactly one block of
/// provisioning behavior when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeploymentSpec {
    /// Name of the backup bucket. A stable name is generated when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,

    /// Server package version to install (e.g. `1.16.3-34.1.34`).
    /// Exported to the instance as `FORGE_VERSION`.
    pub package_version: String,

    /// Local path of the systemd service descriptor for the game server.
    pub server_descriptor_path: String,

    /// Local path of a zip archive expanded into the server directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mods_archive_path: Option<String>,

    /// Local path of a server properties file overlaid onto the defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_config_path: Option<String>,

    /// Key pair the instance is launched with. Without it the host cannot be
    /// reached over SSH.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_name: Option<String>,

    /// Pre-allocated floating IP to associate with the instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating_ip: Option<FloatingIpRef>,
}

/// Reference to a floating IP allocated in its own deployable unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FloatingIpRef {
    /// Logical name of the floating IP: a letter, then letters, digits, spaces, `-` or `_`.
    pub name: String,
}

impl FloatingIpRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl DeploymentSpec {
    /// Create a spec with only the required fields set.
    pub fn new(
        package_version: impl Into<String>,
        server_descriptor_path: impl Into<String>,
    ) -> Self {
        Self {
            bucket_name: None,
            package_version: package_version.into(),
            server_descriptor_path: server_descriptor_path.into(),
            mods_archive_path: None,
            server_config_path: None,
            ssh_key_name: None,
            floating_ip: None,
        }
    }

    pub fn with_bucket_name(mut self, name: impl Into<String>) -> Self {
        self.bucket_name = Some(name.into());
        self
    }

    pub fn with_mods_archive(mut self, path: impl Into<String>) -> Self {
        self.mods_archive_path = Some(path.into());
        self
    }

    pub fn with_server_config(mut self, path: impl Into<String>) -> Self {
        self.server_config_path = Some(path.into());
        self
    }

    pub fn with_ssh_key(mut self, name: impl Into<String>) -> Self {
        self.ssh_key_name = Some(name.into());
        self
    }

    pub fn with_floating_ip(mut self, name: impl Into<String>) -> Self {
        self.floating_ip = Some(FloatingIpRef::new(name));
        self
    }

    /// Whether a mods archive will be downloaded and expanded.
    pub fn has_mods_archive(&self) -> bool {
        self.mods_archive_path.is_some()
    }

    /// Whether a server properties overlay will be downloaded.
    pub fn has_server_config(&self) -> bool {
        self.server_config_path.is_some()
    }

    /// Whether the reported endpoint is backed by a floating IP.
    pub fn has_floating_ip(&self) -> bool {
        self.floating_ip.is_some()
    }
}
