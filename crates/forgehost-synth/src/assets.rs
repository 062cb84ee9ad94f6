// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Asset publishing.
//!
//! A local file referenced by the deployment is staged as a content-addressed
//! object (`assets/<sha256>.<ext>`) and the instance role is granted read
//! access to it in the same call. A caller never holds an [`AssetRef`] the
//! instance cannot download.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::grants::{GrantManager, Principal, Right};
use crate::graph::{GraphError, Resource, ResourceGraph, ResourceId, logical_id_from};

/// Remote object an instance downloads during bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub remote_bucket: String,
    pub remote_key: String,
    /// Where the instance writes the object.
    pub local_target_path: String,
}

impl AssetRef {
    /// `s3://bucket/key` URL of the object.
    pub fn object_url(&self) -> String {
        format!("s3://{}/{}", self.remote_bucket, self.remote_key)
    }
}

/// A published asset node in the resource graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDefinition {
    /// Path of the file as given by the caller.
    pub source_path: String,
    /// SHA-256 of the file contents (hex).
    pub source_hash: String,
    #[serde(flatten)]
    pub object: AssetRef,
}

/// Asset publishing errors.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// The local file does not exist (or is not a regular file).
    #[error("Asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    /// The same file was published twice with different download targets.
    #[error(
        "Asset {} is already published for '{existing}', cannot also publish it for '{requested}'",
        .path.display()
    )]
    AssetConflict {
        path: PathBuf,
        existing: String,
        requested: String,
    },

    /// Reading the file failed.
    #[error("Failed to read asset {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Declaring the asset or its grant failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Publishes local files for one synthesis and grants the instance read access.
#[derive(Debug)]
pub struct AssetPublisher {
    staging_bucket: String,
    stack: String,
    /// canonical source path -> (asset node, reference)
    published: BTreeMap<PathBuf, (ResourceId, AssetRef)>,
}

impl AssetPublisher {
    /// Publisher staging objects in `staging_bucket`, declaring them in `stack`.
    pub fn new(staging_bucket: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            staging_bucket: staging_bucket.into(),
            stack: stack.into(),
            published: BTreeMap::new(),
        }
    }

    /// Publish `local_path` for download to `target` and grant `principal` read access.
    ///
    /// Publishing the same file again for the same target returns the
    /// reference issued the first time.
    pub fn publish(
        &mut self,
        graph: &mut ResourceGraph,
        grants: &mut GrantManager,
        principal: &Principal,
        local_path: &Path,
        target: &str,
    ) -> Result<AssetRef, AssetError> {
        if !local_path.is_file() {
            return Err(AssetError::AssetNotFound(local_path.to_path_buf()));
        }
        let io_err = |source| AssetError::Io {
            path: local_path.to_path_buf(),
            source,
        };
        let canonical = fs::canonicalize(local_path).map_err(io_err)?;

        if let Some((_, existing)) = self.published.get(&canonical) {
            if existing.local_target_path == target {
                return Ok(existing.clone());
            }
            return Err(AssetError::AssetConflict {
                path: local_path.to_path_buf(),
                existing: existing.local_target_path.clone(),
                requested: target.to_string(),
            });
        }

        let contents = fs::read(&canonical).map_err(io_err)?;
        let source_hash = format!("{:x}", Sha256::digest(&contents));
        let extension = local_path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let object = AssetRef {
            remote_bucket: self.staging_bucket.clone(),
            remote_key: format!("assets/{}{}", source_hash, extension),
            local_target_path: target.to_string(),
        };

        let asset_id = graph.add(
            &self.stack,
            logical_id_from("Asset", target),
            Resource::Asset(AssetDefinition {
                source_path: local_path.to_string_lossy().into_owned(),
                source_hash,
                object: object.clone(),
            }),
            &[],
        )?;
        grants.grant(graph, principal, asset_id, &[Right::Read])?;

        tracing::info!(
            source = %local_path.display(),
            key = %object.remote_key,
            target = %target,
            "Published asset"
        );
        self.published.insert(canonical, (asset_id, object.clone()));
        Ok(object)
    }

    /// Asset nodes published so far, in source path order.
    pub fn asset_ids(&self) -> Vec<ResourceId> {
        self.published.values().map(|(id, _)| *id).collect()
    }
}
