// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployable units and the synthesized assembly.
//!
//! A deployment is split into independently deployable stacks: storage (the
//! backup bucket), an optional floating IP, and the server itself. All of them
//! share one resource graph; the [`Assembly`] slices the topologically ordered
//! graph back into per-stack manifests.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::bootstrap::BootstrapScript;
use crate::bootstrap::steps::BootstrapStep;
use crate::error::Result;
use crate::grants::CapabilityGrant;
use crate::graph::{Resource, ResourceGraph};
use crate::instance::{Endpoint, InstanceRecord};

/// Name of the manifest file written by [`Assembly::write_to`].
pub const MANIFEST_FILE: &str = "manifest.json";

/// Stack names derived from the application name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackLayout {
    pub storage: String,
    pub floating_ip: String,
    pub server: String,
}

impl StackLayout {
    pub fn new(app_name: &str) -> Self {
        Self {
            storage: format!("{}-storage", app_name),
            floating_ip: format!("{}-floating-ip", app_name),
            server: format!("{}-server", app_name),
        }
    }

    /// Stack names in deployment order.
    pub fn names(&self) -> [&str; 3] {
        [&self.storage, &self.floating_ip, &self.server].map(String::as_str)
    }
}

/// A value exported by a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackOutput {
    pub logical_id: String,
    pub export_name: String,
    pub description: String,
    pub value: String,
}

impl StackOutput {
    /// The address clients connect to.
    pub fn server_ip(endpoint: &Endpoint) -> Self {
        Self {
            logical_id: "ServerIp".to_string(),
            export_name: "ServerIp".to_string(),
            description: "IP Address used to login to the server.".to_string(),
            value: endpoint.to_string(),
        }
    }
}

/// A resource as written to the manifest.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResource {
    pub logical_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(flatten)]
    pub resource: Resource,
}

/// One deployable unit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackManifest {
    pub name: String,
    /// Stacks that must be deployed first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Resources in creation order.
    pub resources: Vec<ManifestResource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<StackOutput>,
}

/// Result of a synthesis.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assembly {
    pub dsl_version: String,
    pub stacks: Vec<StackManifest>,
    pub endpoint: Endpoint,
    /// Bootstrap steps included in the user data, in order.
    pub bootstrap_steps: Vec<BootstrapStep>,
    /// Rendered user data per stack.
    pub user_data: BTreeMap<String, String>,
    #[serde(skip)]
    pub bootstrap: BootstrapScript,
}

impl Assembly {
    /// Slice the ordered graph into stack manifests.
    pub fn build(
        graph: &ResourceGraph,
        layout: &StackLayout,
        outputs: Vec<(String, StackOutput)>,
        instance: &InstanceRecord,
    ) -> Result<Self> {
        let order = graph.topological_order()?;

        let mut stacks: Vec<StackManifest> = Vec::new();
        for name in layout.names() {
            let mut resources = Vec::new();
            let mut depends_on = BTreeSet::new();

            for id in &order {
                let node = graph.node(*id)?;
                if node.stack != name {
                    continue;
                }
                let mut deps = Vec::with_capacity(node.depends_on.len());
                for dep in &node.depends_on {
                    let dep_node = graph.node(*dep)?;
                    if dep_node.stack != name {
                        depends_on.insert(dep_node.stack.clone());
                    }
                    deps.push(dep_node.logical_id.clone());
                }
                resources.push(ManifestResource {
                    logical_id: node.logical_id.clone(),
                    depends_on: deps,
                    resource: node.resource.clone(),
                });
            }

            if resources.is_empty() {
                continue;
            }
            stacks.push(StackManifest {
                name: name.to_string(),
                depends_on: depends_on.into_iter().collect(),
                resources,
                outputs: outputs
                    .iter()
                    .filter(|(stack, _)| stack == name)
                    .map(|(_, output)| output.clone())
                    .collect(),
            });
        }

        let mut user_data = BTreeMap::new();
        user_data.insert(layout.server.clone(), instance.user_data.clone());

        Ok(Self {
            dsl_version: forgehost_dsl::DSL_VERSION.to_string(),
            stacks,
            endpoint: instance.endpoint.clone(),
            bootstrap_steps: instance.bootstrap.steps(),
            user_data,
            bootstrap: instance.bootstrap.clone(),
        })
    }

    pub fn stack(&self, name: &str) -> Option<&StackManifest> {
        self.stacks.iter().find(|s| s.name == name)
    }

    /// All resources across stacks, in deployment order.
    pub fn resources(&self) -> impl Iterator<Item = &ManifestResource> {
        self.stacks.iter().flat_map(|s| s.resources.iter())
    }

    /// Every capability grant in the assembly.
    pub fn grants(&self) -> Vec<&CapabilityGrant> {
        self.resources()
            .filter_map(|r| match &r.resource {
                Resource::Grant(grant) => Some(grant),
                _ => None,
            })
            .collect()
    }

    /// Position of a resource in the overall deployment order.
    pub fn position(&self, logical_id: &str) -> Option<usize> {
        self.resources().position(|r| r.logical_id == logical_id)
    }

    /// Pretty-printed JSON manifest.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write `manifest.json` and one `<stack>.user-data.sh` per stack with user data.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let manifest = dir.join(MANIFEST_FILE);
        fs::write(&manifest, self.to_json()?)?;
        let mut written = vec![manifest];

        for (stack, user_data) in &self.user_data {
            let path = dir.join(format!("{}.user-data.sh", stack));
            fs::write(&path, user_data)?;
            written.push(path);
        }

        tracing::info!(
            dir = %dir.display(),
            files = written.len(),
            "Wrote assembly"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_names() {
        let layout = StackLayout::new("forgehost");
        assert_eq!(
            layout.names(),
            ["forgehost-storage", "forgehost-floating-ip", "forgehost-server"]
        );
    }

    #[test]
    fn test_server_ip_output() {
        use crate::instance::AddressRef;

        let endpoint = Endpoint {
            address: AddressRef::FloatingIp("FloatingIpServerIp".to_string()),
            port: 25565,
        };
        let output = StackOutput::server_ip(&endpoint);
        assert_eq!(output.export_name, "ServerIp");
        assert_eq!(output.value, "${FloatingIpServerIp.PublicIp}:25565");
    }
}
