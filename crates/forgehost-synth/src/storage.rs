// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backup bucket definition.
//!
//! The bucket outlives every server instance: it is retained when its stack
//! is removed, and only objects under the backup prefix expire.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::graph::{GraphError, Resource, ResourceGraph, ResourceId};

/// Key prefix the backup script writes under.
pub const BACKUP_PREFIX: &str = "backups";

/// Days a backup object is kept before it expires.
pub const BACKUP_RETENTION_DAYS: u32 = 30;

/// Logical id of the backup bucket.
pub const BUCKET_LOGICAL_ID: &str = "BackupBucket";

/// What happens to a resource when its stack is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    Retain,
    Destroy,
}

/// Expire objects under `prefix` after `expiration_days`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRule {
    pub prefix: String,
    pub expiration_days: u32,
}

/// Object storage bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketDefinition {
    pub bucket_name: String,
    pub lifecycle_rules: Vec<LifecycleRule>,
    pub removal_policy: RemovalPolicy,
}

impl BucketDefinition {
    /// Bucket holding server backups with the standard retention rule.
    pub fn backup_bucket(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            lifecycle_rules: vec![LifecycleRule {
                prefix: BACKUP_PREFIX.to_string(),
                expiration_days: BACKUP_RETENTION_DAYS,
            }],
            removal_policy: RemovalPolicy::Retain,
        }
    }
}

/// Handle to the declared backup bucket.
#[derive(Debug, Clone)]
pub struct BackupStorage {
    pub id: ResourceId,
    pub bucket_name: String,
}

/// Declare the backup bucket in `stack`.
pub fn declare_backup_bucket(
    graph: &mut ResourceGraph,
    stack: &str,
    bucket_name: &str,
) -> Result<BackupStorage, GraphError> {
    let id = graph.add(
        stack,
        BUCKET_LOGICAL_ID,
        Resource::Bucket(BucketDefinition::backup_bucket(bucket_name)),
        &[],
    )?;
    Ok(BackupStorage {
        id,
        bucket_name: bucket_name.to_string(),
    })
}

/// Bucket name to use: the explicit one, or a stable name derived from the app name.
pub fn resolve_bucket_name(explicit: Option<&str>, app_name: &str) -> String {
    if let Some(name) = explicit {
        return name.to_string();
    }
    let digest = Sha256::digest(format!("{}/{}", app_name, BUCKET_LOGICAL_ID).as_bytes());
    let suffix = format!("{:x}", digest);
    let prefix: String = app_name.chars().take(40).collect();
    format!("{}-backups-{}", prefix.trim_end_matches('-'), &suffix[..8])
}

/// Check a bucket name against object storage naming rules.
pub fn validate_bucket_name(name: &str) -> Result<(), String> {
    if name.len() < 3 || name.len() > 63 {
        return Err(format!(
            "must be between 3 and 63 characters long, got {}",
            name.len()
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '.'))
    {
        return Err(format!("contains invalid character '{}'", c));
    }
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.starts_with(alnum) || !name.ends_with(alnum) {
        return Err("must start and end with a lowercase letter or digit".to_string());
    }
    if name.contains("..") {
        return Err("must not contain consecutive periods".to_string());
    }
    Ok(())
}
