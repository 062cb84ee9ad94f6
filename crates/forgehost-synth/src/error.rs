// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for forgehost-synth.

use thiserror::Error;

/// Synthesis errors.
///
/// Every variant is raised before the assembly is handed off, so a failed
/// synthesis never leaves a partially declared deployment behind.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SynthError {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The deployment spec failed validation.
    #[error("Deployment spec is invalid:\n{0}")]
    InvalidSpec(String),

    /// Publishing a local file failed.
    #[error("Asset error: {0}")]
    Asset(#[from] crate::assets::AssetError),

    /// The resource graph is inconsistent.
    #[error("Resource graph error: {0}")]
    Graph(#[from] crate::graph::GraphError),

    /// Composing the bootstrap script failed.
    #[error("Bootstrap error: {0}")]
    Compose(#[from] crate::bootstrap::ComposeError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type using [`SynthError`].
pub type Result<T> = std::result::Result<T, SynthError>;
