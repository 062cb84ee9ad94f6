// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource graph for deployment synthesis.
//!
//! Every cloud resource, grant and association declared during synthesis is a
//! node in a [`ResourceGraph`]. Nodes can only be created through
//! [`ResourceGraph::add`], which hands back an opaque [`ResourceId`], and
//! dependencies can only name ids that already exist. A grant therefore cannot
//! be declared before both its principal and its resource, and the creation
//! order is derived with a topological sort instead of call-order discipline.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::assets::AssetDefinition;
use crate::grants::CapabilityGrant;
use crate::instance::{
    FloatingIpAssociation, FloatingIpDefinition, InstanceDefinition, InstanceRoleDefinition,
};
use crate::network::{SecurityGroupDefinition, SubnetDefinition, VpcDefinition};
use crate::storage::BucketDefinition;

// ============================================================================
// Resource Types
// ============================================================================

/// Handle to a node in a [`ResourceGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(usize);

impl ResourceId {
    /// Position of the node in declaration order.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A declared cloud resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Resource {
    Bucket(BucketDefinition),
    Vpc(VpcDefinition),
    Subnet(SubnetDefinition),
    SecurityGroup(SecurityGroupDefinition),
    InstanceRole(InstanceRoleDefinition),
    Asset(AssetDefinition),
    Grant(CapabilityGrant),
    Instance(Box<InstanceDefinition>),
    FloatingIp(FloatingIpDefinition),
    FloatingIpAssociation(FloatingIpAssociation),
}

impl Resource {
    /// Resource type name used in logs and manifests.
    pub fn type_name(&self) -> &'static str {
        match self {
            Resource::Bucket(_) => "Bucket",
            Resource::Vpc(_) => "Vpc",
            Resource::Subnet(_) => "Subnet",
            Resource::SecurityGroup(_) => "SecurityGroup",
            Resource::InstanceRole(_) => "InstanceRole",
            Resource::Asset(_) => "Asset",
            Resource::Grant(_) => "Grant",
            Resource::Instance(_) => "Instance",
            Resource::FloatingIp(_) => "FloatingIp",
            Resource::FloatingIpAssociation(_) => "FloatingIpAssociation",
        }
    }
}

/// A node of the resource graph.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    /// Unique, stable identifier of the resource within the deployment.
    pub logical_id: String,
    /// Deployable unit the resource belongs to.
    pub stack: String,
    /// The resource itself.
    pub resource: Resource,
    /// Resources that must exist before this one is created.
    pub depends_on: BTreeSet<ResourceId>,
}

/// Resource graph errors.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Two resources were declared with the same logical id.
    #[error("Duplicate logical id '{0}'")]
    DuplicateLogicalId(String),

    /// A dependency names a resource that is not part of this graph.
    #[error("Resource {0:?} is not part of this graph")]
    UnknownResource(ResourceId),

    /// A grant was requested with an empty set of rights.
    #[error("Grant on '{resource}' requested no rights")]
    EmptyGrant { resource: String },

    /// A node of the wrong type was passed where a specific resource was expected.
    #[error("Resource '{logical_id}' is a {actual}, expected {expected}")]
    WrongResourceType {
        logical_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The dependency edges form a cycle.
    #[error("{}", ResourceGraph::format_cycle_error(.0))]
    CycleDetected(Vec<String>),
}

// ============================================================================
// Resource Graph
// ============================================================================

/// Directed acyclic graph of declared resources.
#[derive(Debug, Default)]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    by_logical_id: HashMap<String, ResourceId>,
}

impl ResourceGraph {
    /// Create a new empty resource graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource that depends on `depends_on`.
    pub fn add(
        &mut self,
        stack: &str,
        logical_id: impl Into<String>,
        resource: Resource,
        depends_on: &[ResourceId],
    ) -> Result<ResourceId, GraphError> {
        let logical_id = logical_id.into();
        if self.by_logical_id.contains_key(&logical_id) {
            return Err(GraphError::DuplicateLogicalId(logical_id));
        }
        for dep in depends_on {
            self.check(*dep)?;
        }

        let id = ResourceId(self.nodes.len());
        tracing::debug!(
            logical_id = %logical_id,
            stack = %stack,
            resource_type = resource.type_name(),
            "Declared resource"
        );
        self.by_logical_id.insert(logical_id.clone(), id);
        self.nodes.push(ResourceNode {
            logical_id,
            stack: stack.to_string(),
            resource,
            depends_on: depends_on.iter().copied().collect(),
        });
        Ok(id)
    }

    /// Add a dependency edge: `from` is created after `on`.
    pub fn add_dependency(&mut self, from: ResourceId, on: ResourceId) -> Result<(), GraphError> {
        self.check(from)?;
        self.check(on)?;
        self.nodes[from.0].depends_on.insert(on);
        Ok(())
    }

    fn check(&self, id: ResourceId) -> Result<(), GraphError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownResource(id))
        }
    }

    /// Get a node by id.
    pub fn node(&self, id: ResourceId) -> Result<&ResourceNode, GraphError> {
        self.nodes.get(id.0).ok_or(GraphError::UnknownResource(id))
    }

    /// Get a mutable node by id.
    pub(crate) fn node_mut(&mut self, id: ResourceId) -> Result<&mut ResourceNode, GraphError> {
        self.nodes
            .get_mut(id.0)
            .ok_or(GraphError::UnknownResource(id))
    }

    /// Look up a resource by logical id.
    pub fn find(&self, logical_id: &str) -> Option<ResourceId> {
        self.by_logical_id.get(logical_id).copied()
    }

    /// Logical id of a node.
    pub fn logical_id(&self, id: ResourceId) -> Result<&str, GraphError> {
        Ok(self.node(id)?.logical_id.as_str())
    }

    /// Number of declared resources.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no resource has been declared.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over nodes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &ResourceNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (ResourceId(i), n))
    }

    /// Order in which resources must be created.
    ///
    /// Kahn's algorithm, breaking ties by declaration order so that the same
    /// graph always yields the same order.
    pub fn topological_order(&self) -> Result<Vec<ResourceId>, GraphError> {
        let mut remaining: Vec<usize> = self.nodes.iter().map(|n| n.depends_on.len()).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            for dep in &node.depends_on {
                dependents[dep.0].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(next) = ready.pop_first() {
            order.push(ResourceId(next));
            for &dependent in &dependents[next] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() == self.nodes.len() {
            return Ok(order);
        }

        // Some node never became ready: find a cycle among them for the error.
        let stuck = (0..self.nodes.len())
            .find(|i| remaining[*i] > 0)
            .map(ResourceId)
            .ok_or(GraphError::CycleDetected(Vec::new()))?;
        match self.detect_cycles(stuck) {
            Err(cycle) => Err(GraphError::CycleDetected(
                cycle
                    .into_iter()
                    .map(|id| self.nodes[id.0].logical_id.clone())
                    .collect(),
            )),
            Ok(()) => Err(GraphError::CycleDetected(Vec::new())),
        }
    }

    /// Detect circular dependencies reachable from `start` using depth-first search.
    /// Returns Ok(()) if no cycles, or Err with the cycle path if a cycle is detected
    pub fn detect_cycles(&self, start: ResourceId) -> Result<(), Vec<ResourceId>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        self.dfs(start, &mut visited, &mut path)
    }

    fn dfs(
        &self,
        node: ResourceId,
        visited: &mut HashSet<ResourceId>,
        path: &mut Vec<ResourceId>,
    ) -> Result<(), Vec<ResourceId>> {
        if let Some(start) = path.iter().position(|n| *n == node) {
            let mut cycle = path[start..].to_vec();
            cycle.push(node);
            return Err(cycle);
        }

        if visited.contains(&node) {
            return Ok(());
        }

        path.push(node);
        if let Some(current) = self.nodes.get(node.0) {
            for dep in &current.depends_on {
                self.dfs(*dep, visited, path)?;
            }
        }
        path.pop();
        visited.insert(node);

        Ok(())
    }

    /// Format a cycle path as a human-readable error message
    pub fn format_cycle_error(cycle: &[String]) -> String {
        if cycle.is_empty() {
            return "Circular dependency detected".to_string();
        }
        let mut msg = String::from("Circular dependency detected:\n\nCycle path:\n");
        for (i, node) in cycle.iter().enumerate() {
            if i > 0 {
                msg.push_str("  → ");
            } else {
                msg.push_str("  ");
            }
            msg.push_str(node);
            if i == cycle.len() - 1 {
                msg.push_str("  ← Cycle!");
            }
            msg.push('\n');
        }
        msg
    }
}

/// Build a PascalCase logical id from a prefix and free-form text.
///
/// `("Asset", "/minecraft_config/bin/backup.sh")` becomes
/// `AssetMinecraftConfigBinBackupSh`.
pub fn logical_id_from(prefix: &str, text: &str) -> String {
    let mut id = String::from(prefix);
    for part in text.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            id.push(first.to_ascii_uppercase());
            id.extend(chars);
        }
    }
    id
}
