// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Instance provisioning.
//!
//! Declares the instance role (the principal grants are issued to), the
//! compute instance with its first-boot user data, and the optional
//! floating-IP association. The association is a separate node because the
//! floating IP lives in its own stack and outlives any single instance.

use serde::Serialize;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use forgehost_dsl::FloatingIpRef;

use crate::bootstrap::BootstrapScript;
use crate::bootstrap::render::render_user_data;
use crate::error::Result;
use crate::grants::Principal;
use crate::graph::{GraphError, Resource, ResourceGraph, ResourceId, logical_id_from};
use crate::network::{GAME_PORT, NetworkPolicy, NetworkTopology};
use crate::storage::RemovalPolicy;

/// Logical id of the instance role.
pub const ROLE_LOGICAL_ID: &str = "InstanceRole";

/// Logical id of the game server instance.
pub const INSTANCE_LOGICAL_ID: &str = "GameServerInstance";

/// Service principal allowed to assume the instance role.
const COMPUTE_SERVICE_PRINCIPAL: &str = "ec2.amazonaws.com";

// ============================================================================
// Resource Definitions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRoleDefinition {
    pub assumed_by: String,
}

/// Machine image the instance boots from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MachineImage {
    /// Newest image whose name matches `name_pattern`, owned by one of `owners`.
    Lookup {
        name_pattern: String,
        owners: Vec<String>,
    },
    /// A fixed image id.
    Id { image_id: String },
}

impl MachineImage {
    /// Amazon Linux 2 HVM images.
    pub fn amazon_linux_2() -> Self {
        MachineImage::Lookup {
            name_pattern: "amzn2-ami-hvm*".to_string(),
            owners: vec!["amazon".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDefinition {
    pub instance_type: String,
    pub machine_image: MachineImage,
    pub subnet: String,
    pub security_group: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Rendered first-boot script.
    pub user_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatingIpDefinition {
    pub name: String,
    pub removal_policy: RemovalPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatingIpAssociation {
    pub floating_ip: String,
    pub instance: String,
}

// ============================================================================
// Endpoint
// ============================================================================

/// Where the reported address comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase", tag = "source", content = "logicalId")]
pub enum AddressRef {
    /// Address of a floating IP: stable across instance replacement.
    FloatingIp(String),
    /// The instance's own public address: changes when the instance is replaced.
    InstancePublicIp(String),
}

impl AddressRef {
    pub fn logical_id(&self) -> &str {
        match self {
            AddressRef::FloatingIp(id) | AddressRef::InstancePublicIp(id) => id,
        }
    }

    /// Whether the address survives instance replacement.
    pub fn is_stable(&self) -> bool {
        matches!(self, AddressRef::FloatingIp(_))
    }
}

impl std::fmt::Display for AddressRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${{{}.PublicIp}}", self.logical_id())
    }
}

/// How clients reach the game service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub address: AddressRef,
    pub port: u16,
}

impl Endpoint {
    /// Resolve against deployed addresses, keyed by logical id.
    pub fn resolve(&self, addresses: &HashMap<String, IpAddr>) -> Option<SocketAddr> {
        addresses
            .get(self.address.logical_id())
            .map(|ip| SocketAddr::new(*ip, self.port))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

// ============================================================================
// Provisioning
// ============================================================================

/// Declare the role the instance runs as.
pub fn declare_instance_role(
    graph: &mut ResourceGraph,
    stack: &str,
) -> std::result::Result<Principal, GraphError> {
    let id = graph.add(
        stack,
        ROLE_LOGICAL_ID,
        Resource::InstanceRole(InstanceRoleDefinition {
            assumed_by: COMPUTE_SERVICE_PRINCIPAL.to_string(),
        }),
        &[],
    )?;
    Ok(Principal {
        id,
        logical_id: ROLE_LOGICAL_ID.to_string(),
    })
}

/// Allocate a floating IP in its own stack. It is retained when the stack is removed.
pub fn allocate_floating_ip(
    graph: &mut ResourceGraph,
    stack: &str,
    floating_ip: &FloatingIpRef,
) -> std::result::Result<ResourceId, GraphError> {
    graph.add(
        stack,
        logical_id_from("FloatingIp", &floating_ip.name),
        Resource::FloatingIp(FloatingIpDefinition {
            name: floating_ip.name.clone(),
            removal_policy: RemovalPolicy::Retain,
        }),
        &[],
    )
}

/// Everything the provisioner needs to declare the instance.
pub struct ProvisionRequest<'a> {
    pub stack: &'a str,
    pub network: &'a NetworkTopology,
    pub image: MachineImage,
    pub instance_type: &'a str,
    /// Consumed: the script cannot change after handoff.
    pub bootstrap: BootstrapScript,
    pub ssh_key_name: Option<String>,
    pub principal: &'a Principal,
    /// Grants that must be in place before first boot.
    pub grants: Vec<ResourceId>,
    /// Pre-allocated floating IP to associate.
    pub floating_ip: Option<ResourceId>,
}

/// The provisioned instance.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub instance: ResourceId,
    pub logical_id: String,
    pub network_policy: NetworkPolicy,
    pub machine_image: MachineImage,
    pub bootstrap: BootstrapScript,
    pub user_data: String,
    pub ssh_key_name: Option<String>,
    pub floating_ip: Option<ResourceId>,
    pub association: Option<ResourceId>,
    pub endpoint: Endpoint,
}

/// Declare exactly one instance, plus the floating-IP association if requested.
pub fn provision(graph: &mut ResourceGraph, request: ProvisionRequest<'_>) -> Result<InstanceRecord> {
    let ProvisionRequest {
        stack,
        network,
        image,
        instance_type,
        bootstrap,
        ssh_key_name,
        principal,
        grants,
        floating_ip,
    } = request;

    let user_data = render_user_data(&bootstrap)?;

    let mut depends_on = vec![network.subnet, network.security_group, principal.id];
    depends_on.extend(grants);

    let definition = InstanceDefinition {
        instance_type: instance_type.to_string(),
        machine_image: image.clone(),
        subnet: graph.logical_id(network.subnet)?.to_string(),
        security_group: graph.logical_id(network.security_group)?.to_string(),
        role: principal.logical_id.clone(),
        key_name: ssh_key_name.clone(),
        user_data: user_data.clone(),
    };
    let instance = graph.add(
        stack,
        INSTANCE_LOGICAL_ID,
        Resource::Instance(Box::new(definition)),
        &depends_on,
    )?;

    let (association, address) = match floating_ip {
        Some(fip) => {
            let fip_node = graph.node(fip)?;
            if !matches!(fip_node.resource, Resource::FloatingIp(_)) {
                return Err(GraphError::WrongResourceType {
                    logical_id: fip_node.logical_id.clone(),
                    expected: "FloatingIp",
                    actual: fip_node.resource.type_name(),
                }
                .into());
            }
            let fip_id = fip_node.logical_id.clone();
            let association = graph.add(
                stack,
                "FloatingIpAssociation",
                Resource::FloatingIpAssociation(FloatingIpAssociation {
                    floating_ip: fip_id.clone(),
                    instance: INSTANCE_LOGICAL_ID.to_string(),
                }),
                &[instance, fip],
            )?;
            (Some(association), AddressRef::FloatingIp(fip_id))
        }
        None => (
            None,
            AddressRef::InstancePublicIp(INSTANCE_LOGICAL_ID.to_string()),
        ),
    };

    let endpoint = Endpoint {
        address,
        port: GAME_PORT,
    };
    tracing::info!(
        instance = INSTANCE_LOGICAL_ID,
        instance_type = %instance_type,
        endpoint = %endpoint,
        stable_address = endpoint.address.is_stable(),
        "Provisioned instance"
    );

    Ok(InstanceRecord {
        instance,
        logical_id: INSTANCE_LOGICAL_ID.to_string(),
        network_policy: network.policy.clone(),
        machine_image: image,
        bootstrap,
        user_data,
        ssh_key_name,
        floating_ip,
        association,
        endpoint,
    })
}
