// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Capability grants.
//!
//! A grant gives a principal (the instance role) a set of rights on one
//! resource. Grants are nodes of the resource graph that depend on both sides,
//! so they can only be applied once the principal and the resource exist.
//! Rights on the same (principal, resource) pair are merged, never revoked.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use strum::Display;

use crate::graph::{GraphError, Resource, ResourceGraph, ResourceId};

/// A right a principal can hold on a storage resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Right {
    Read,
    Write,
    Delete,
}

/// Convenience constructor for a set of rights.
pub fn rights(list: &[Right]) -> BTreeSet<Right> {
    list.iter().copied().collect()
}

/// The identity the instance acts as.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: ResourceId,
    pub logical_id: String,
}

/// A materialized grant in the resource graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityGrant {
    /// Logical id of the principal.
    pub principal: String,
    /// Logical id of the resource.
    pub resource: String,
    pub rights: BTreeSet<Right>,
}

/// A mismatch between issued and required grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantFinding {
    /// Rights were granted that nothing in the deployment needs.
    OverGrant {
        resource: String,
        extra: BTreeSet<Right>,
    },
    /// Rights the deployment needs were not granted.
    UnderGrant {
        resource: String,
        missing: BTreeSet<Right>,
    },
}

impl std::fmt::Display for GrantFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |set: &BTreeSet<Right>| {
            set.iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            GrantFinding::OverGrant { resource, extra } => {
                write!(f, "'{}' grants unneeded rights: {}", resource, join(extra))
            }
            GrantFinding::UnderGrant { resource, missing } => {
                write!(f, "'{}' is missing rights: {}", resource, join(missing))
            }
        }
    }
}

/// Issues grants and keeps track of what was granted.
#[derive(Debug, Default)]
pub struct GrantManager {
    /// (principal, resource) -> grant node
    ledger: BTreeMap<(ResourceId, ResourceId), ResourceId>,
}

impl GrantManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `rights` on `resource` to `principal`.
    ///
    /// The first grant for a pair declares a grant node depending on both
    /// sides; later grants add their rights to that node.
    pub fn grant(
        &mut self,
        graph: &mut ResourceGraph,
        principal: &Principal,
        resource: ResourceId,
        rights: &[Right],
    ) -> Result<ResourceId, GraphError> {
        let resource_id = graph.logical_id(resource)?.to_string();
        if rights.is_empty() {
            return Err(GraphError::EmptyGrant {
                resource: resource_id,
            });
        }

        if let Some(&grant_id) = self.ledger.get(&(principal.id, resource)) {
            let node = graph.node_mut(grant_id)?;
            if let Resource::Grant(grant) = &mut node.resource {
                grant.rights.extend(rights.iter().copied());
            }
            return Ok(grant_id);
        }

        let stack = graph.node(principal.id)?.stack.clone();
        let grant = CapabilityGrant {
            principal: principal.logical_id.clone(),
            resource: resource_id.clone(),
            rights: rights.iter().copied().collect(),
        };
        let grant_id = graph.add(
            &stack,
            format!("{}Grant{}", principal.logical_id, resource_id),
            Resource::Grant(grant),
            &[principal.id, resource],
        )?;
        tracing::debug!(
            principal = %principal.logical_id,
            resource = %resource_id,
            rights = ?rights,
            "Granted capability"
        );
        self.ledger.insert((principal.id, resource), grant_id);
        Ok(grant_id)
    }

    /// Grant nodes issued to `principal`, in resource declaration order.
    pub fn grant_ids_for(&self, principal: &Principal) -> Vec<ResourceId> {
        self.ledger
            .iter()
            .filter(|((p, _), _)| *p == principal.id)
            .map(|(_, grant)| *grant)
            .collect()
    }

    /// Rights currently held on each resource, keyed by resource id.
    pub fn held_rights(
        &self,
        graph: &ResourceGraph,
    ) -> Result<BTreeMap<ResourceId, BTreeSet<Right>>, GraphError> {
        let mut held: BTreeMap<ResourceId, BTreeSet<Right>> = BTreeMap::new();
        for ((_, resource), grant_id) in &self.ledger {
            if let Resource::Grant(grant) = &graph.node(*grant_id)?.resource {
                held.entry(*resource)
                    .or_default()
                    .extend(grant.rights.iter().copied());
            }
        }
        Ok(held)
    }

    /// Compare issued grants with the rights the deployment actually needs.
    pub fn review(
        &self,
        graph: &ResourceGraph,
        required: &BTreeMap<ResourceId, BTreeSet<Right>>,
    ) -> Result<Vec<GrantFinding>, GraphError> {
        let held = self.held_rights(graph)?;
        let mut findings = Vec::new();
        let empty = BTreeSet::new();

        let resources: BTreeSet<ResourceId> = held.keys().chain(required.keys()).copied().collect();
        for resource in resources {
            let have = held.get(&resource).unwrap_or(&empty);
            let need = required.get(&resource).unwrap_or(&empty);
            let name = graph.logical_id(resource)?.to_string();

            let extra: BTreeSet<Right> = have.difference(need).copied().collect();
            if !extra.is_empty() {
                findings.push(GrantFinding::OverGrant {
                    resource: name.clone(),
                    extra,
                });
            }
            let missing: BTreeSet<Right> = need.difference(have).copied().collect();
            if !missing.is_empty() {
                findings.push(GrantFinding::UnderGrant {
                    resource: name,
                    missing,
                });
            }
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::declare_instance_role;
    use crate::storage::declare_backup_bucket;

    fn setup() -> (ResourceGraph, Principal, ResourceId) {
        let mut graph = ResourceGraph::new();
        let bucket = declare_backup_bucket(&mut graph, "storage", "mc-backups").unwrap();
        let role = declare_instance_role(&mut graph, "server").unwrap();
        (graph, role, bucket.id)
    }

    #[test]
    fn test_grant_depends_on_both_sides() {
        let (mut graph, role, bucket) = setup();
        let mut grants = GrantManager::new();
        let grant = grants
            .grant(&mut graph, &role, bucket, &[Right::Read])
            .unwrap();

        let node = graph.node(grant).unwrap();
        assert!(node.depends_on.contains(&role.id));
        assert!(node.depends_on.contains(&bucket));
        assert_eq!(node.stack, "server");

        let order = graph.topological_order().unwrap();
        let pos = |id| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(grant) > pos(role.id));
        assert!(pos(grant) > pos(bucket));
    }

    #[test]
    fn test_rights_are_additive() {
        let (mut graph, role, bucket) = setup();
        let mut grants = GrantManager::new();
        let first = grants
            .grant(&mut graph, &role, bucket, &[Right::Read, Right::Write])
            .unwrap();
        let second = grants
            .grant(&mut graph, &role, bucket, &[Right::Delete])
            .unwrap();

        assert_eq!(first, second);
        let held = grants.held_rights(&graph).unwrap();
        assert_eq!(
            held[&bucket],
            rights(&[Right::Read, Right::Write, Right::Delete])
        );
    }

    #[test]
    fn test_empty_grant_rejected() {
        let (mut graph, role, bucket) = setup();
        let mut grants = GrantManager::new();
        let result = grants.grant(&mut graph, &role, bucket, &[]);
        assert!(matches!(result, Err(GraphError::EmptyGrant { .. })));
    }

    #[test]
    fn test_review_flags_over_and_under_grants() {
        let (mut graph, role, bucket) = setup();
        let mut grants = GrantManager::new();
        grants
            .grant(&mut graph, &role, bucket, &[Right::Read, Right::Delete])
            .unwrap();

        let mut required = BTreeMap::new();
        required.insert(bucket, rights(&[Right::Read, Right::Write]));
        let findings = grants.review(&graph, &required).unwrap();

        assert_eq!(findings.len(), 2);
        assert!(findings.contains(&GrantFinding::OverGrant {
            resource: "BackupBucket".to_string(),
            extra: rights(&[Right::Delete]),
        }));
        assert!(findings.contains(&GrantFinding::UnderGrant {
            resource: "BackupBucket".to_string(),
            missing: rights(&[Right::Write]),
        }));
    }

    #[test]
    fn test_review_exact_grants_is_clean() {
        let (mut graph, role, bucket) = setup();
        let mut grants = GrantManager::new();
        grants
            .grant(&mut graph, &role, bucket, &[Right::Read, Right::Write, Right::Delete])
            .unwrap();

        let mut required = BTreeMap::new();
        required.insert(bucket, rights(&[Right::Read, Right::Write, Right::Delete]));
        assert!(grants.review(&graph, &required).unwrap().is_empty());
    }

    #[test]
    fn test_right_display() {
        assert_eq!(Right::Read.to_string(), "read");
        assert_eq!(Right::Delete.to_string(), "delete");
        assert_eq!(
            serde_json::to_string(&rights(&[Right::Write, Right::Read])).unwrap(),
            r#"["read","write"]"#
        );
    }
}
