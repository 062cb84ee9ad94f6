// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Network topology: an isolated network, one public subnet and the security
//! policy of the game server.
//!
//! The policy is fixed. SSH and the game port are open to any IPv4 source;
//! the server is meant to be publicly reachable.

use serde::Serialize;
use strum::Display;

use crate::graph::{GraphError, Resource, ResourceGraph, ResourceId};

/// Administrative SSH port.
pub const SSH_PORT: u16 = 22;

/// Port the game server listens on (TCP and UDP).
pub const GAME_PORT: u16 = 25565;

/// Any IPv4 source.
pub const ANY_IPV4: &str = "0.0.0.0/0";

const VPC_CIDR: &str = "10.0.0.0/16";
const PUBLIC_SUBNET_CIDR: &str = "10.0.0.0/24";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Inbound allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    pub protocol: Protocol,
    pub port: u16,
    pub source_cidr: String,
    pub description: String,
}

impl IngressRule {
    fn from_anywhere(protocol: Protocol, port: u16, description: &str) -> Self {
        Self {
            protocol,
            port,
            source_cidr: ANY_IPV4.to_string(),
            description: description.to_string(),
        }
    }
}

/// Inbound rules applied to the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPolicy {
    pub ingress_rules: Vec<IngressRule>,
}

impl NetworkPolicy {
    /// SSH/22/tcp, game/tcp and game/udp, each from anywhere.
    pub fn game_server() -> Self {
        Self {
            ingress_rules: vec![
                IngressRule::from_anywhere(Protocol::Tcp, SSH_PORT, "allow ssh access from the world"),
                IngressRule::from_anywhere(Protocol::Tcp, GAME_PORT, "game clients tcp"),
                IngressRule::from_anywhere(Protocol::Udp, GAME_PORT, "game clients udp"),
            ],
        }
    }

    /// Whether inbound `protocol` traffic on `port` is allowed.
    pub fn allows(&self, protocol: Protocol, port: u16) -> bool {
        self.ingress_rules
            .iter()
            .any(|r| r.protocol == protocol && r.port == port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcDefinition {
    pub cidr: String,
    pub max_azs: u8,
}

impl VpcDefinition {
    pub fn single_zone() -> Self {
        Self {
            cidr: VPC_CIDR.to_string(),
            max_azs: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetDefinition {
    pub vpc: String,
    pub cidr: String,
    pub map_public_ip_on_launch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupDefinition {
    pub vpc: String,
    pub description: String,
    pub allow_all_outbound: bool,
    #[serde(flatten)]
    pub policy: NetworkPolicy,
}

/// Handles to the declared network resources.
#[derive(Debug, Clone)]
pub struct NetworkTopology {
    pub vpc: ResourceId,
    pub subnet: ResourceId,
    pub security_group: ResourceId,
    pub policy: NetworkPolicy,
}

/// Declare the network, public subnet and security group in `stack`.
pub fn build_network(graph: &mut ResourceGraph, stack: &str) -> Result<NetworkTopology, GraphError> {
    let vpc = graph.add(stack, "Vpc", Resource::Vpc(VpcDefinition::single_zone()), &[])?;
    let vpc_id = graph.logical_id(vpc)?.to_string();

    let subnet = graph.add(
        stack,
        "PublicSubnet",
        Resource::Subnet(SubnetDefinition {
            vpc: vpc_id.clone(),
            cidr: PUBLIC_SUBNET_CIDR.to_string(),
            map_public_ip_on_launch: true,
        }),
        &[vpc],
    )?;

    let policy = NetworkPolicy::game_server();
    let security_group = graph.add(
        stack,
        "SecurityGroup",
        Resource::SecurityGroup(SecurityGroupDefinition {
            vpc: vpc_id,
            description: "Allow ssh and game client access to the server".to_string(),
            allow_all_outbound: true,
            policy: policy.clone(),
        }),
        &[vpc],
    )?;

    Ok(NetworkTopology {
        vpc,
        subnet,
        security_group,
        policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_server_policy() {
        let policy = NetworkPolicy::game_server();
        assert_eq!(policy.ingress_rules.len(), 3);
        assert!(policy.allows(Protocol::Tcp, 22));
        assert!(policy.allows(Protocol::Tcp, 25565));
        assert!(policy.allows(Protocol::Udp, 25565));
        assert!(!policy.allows(Protocol::Udp, 22));
        assert!(policy.ingress_rules.iter().all(|r| r.source_cidr == "0.0.0.0/0"));
    }

    #[test]
    fn test_build_network_wiring() {
        let mut graph = ResourceGraph::new();
        let net = build_network(&mut graph, "server").unwrap();

        assert!(graph.node(net.subnet).unwrap().depends_on.contains(&net.vpc));
        assert!(graph.node(net.security_group).unwrap().depends_on.contains(&net.vpc));

        match &graph.node(net.vpc).unwrap().resource {
            Resource::Vpc(vpc) => assert_eq!(vpc.max_azs, 1),
            other => panic!("unexpected resource {}", other.type_name()),
        }
        match &graph.node(net.security_group).unwrap().resource {
            Resource::SecurityGroup(sg) => {
                assert!(sg.allow_all_outbound);
                assert_eq!(sg.policy, NetworkPolicy::game_server());
            }
            other => panic!("unexpected resource {}", other.type_name()),
        }
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(Protocol::Tcp.to_string(), "tcp");
        assert_eq!(Protocol::Udp.to_string(), "udp");
    }
}
