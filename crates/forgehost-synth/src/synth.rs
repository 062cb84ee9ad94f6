// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Synthesis: deployment spec to assembly.
//!
//! One synchronous pass. Each call builds its own resource graph, so two
//! syntheses never share state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;

use forgehost_dsl::DeploymentSpec;

use crate::assets::{AssetPublisher, AssetRef};
use crate::bootstrap::{self, ComposeInput, HELPER_SCRIPTS, InstanceLayout, ResolvedAssets};
use crate::config::SynthConfig;
use crate::error::{Result, SynthError};
use crate::grants::{GrantFinding, GrantManager, Right, rights};
use crate::graph::{ResourceGraph, ResourceId};
use crate::instance::{self, MachineImage, ProvisionRequest};
use crate::network::build_network;
use crate::stack::{Assembly, StackLayout, StackOutput};
use crate::storage::{declare_backup_bucket, resolve_bucket_name};
use crate::validation::validate_spec;

/// Input for synthesis.
#[derive(Debug, Clone)]
pub struct SynthesisInput {
    /// The deployment to synthesize.
    pub spec: DeploymentSpec,
    /// Operator configuration.
    pub config: SynthConfig,
    /// Directory relative spec paths are resolved against.
    pub base_dir: PathBuf,
}

impl SynthesisInput {
    /// Input resolving relative paths against the current directory.
    pub fn new(spec: DeploymentSpec, config: SynthConfig) -> Self {
        Self {
            spec,
            config,
            base_dir: PathBuf::from("."),
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }
}

/// Synthesize the resource graph and bootstrap script for a deployment.
pub fn synthesize(input: &SynthesisInput) -> Result<Assembly> {
    let SynthesisInput {
        spec,
        config,
        base_dir,
    } = input;

    let validation = validate_spec(spec, config);
    for warning in &validation.warnings {
        tracing::warn!(code = warning.code(), warning = %warning, "Deployment spec warning");
    }
    if validation.has_errors() {
        return Err(SynthError::InvalidSpec(validation.error_report()));
    }

    let layout = StackLayout::new(&config.app_name);
    let mut graph = ResourceGraph::new();

    // Durable storage first: it outlives every server stack.
    let bucket_name = resolve_bucket_name(spec.bucket_name.as_deref(), &config.app_name);
    let storage = declare_backup_bucket(&mut graph, &layout.storage, &bucket_name)?;

    let floating_ip = spec
        .floating_ip
        .as_ref()
        .map(|fip| instance::allocate_floating_ip(&mut graph, &layout.floating_ip, fip))
        .transpose()?;

    let network = build_network(&mut graph, &layout.server)?;
    let role = instance::declare_instance_role(&mut graph, &layout.server)?;

    let instance_layout = InstanceLayout::default();
    let mut grants = GrantManager::new();
    let mut publisher = AssetPublisher::new(&config.staging_bucket, &layout.server);
    let mut publish = |graph: &mut ResourceGraph, path: &Path, target: &Path| -> Result<AssetRef> {
        let local = base_dir.join(path);
        Ok(publisher.publish(graph, &mut grants, &role, &local, &target.to_string_lossy())?)
    };

    let server_config = spec
        .server_config_path
        .as_deref()
        .map(|path| publish(&mut graph, Path::new(path), &instance_layout.server_config_target()))
        .transpose()?;
    let mods_archive = spec
        .mods_archive_path
        .as_deref()
        .map(|path| publish(&mut graph, Path::new(path), &instance_layout.mods_archive_target()))
        .transpose()?;
    let service_descriptor = publish(
        &mut graph,
        Path::new(&spec.server_descriptor_path),
        &instance_layout.service_descriptor,
    )?;
    let helpers = HELPER_SCRIPTS
        .iter()
        .map(|name| {
            publish(
                &mut graph,
                &config.resources_dir.join(name),
                &instance_layout.helper_target(name),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let assets = ResolvedAssets {
        server_config,
        mods_archive,
        service_descriptor: Some(service_descriptor),
        helpers,
    };

    // Backups are uploaded and pruned by the instance.
    grants.grant(
        &mut graph,
        &role,
        storage.id,
        &[Right::Read, Right::Write, Right::Delete],
    )?;
    review_grants(&graph, &grants, storage.id, &publisher.asset_ids())?;

    let script = bootstrap::compose(&ComposeInput {
        spec,
        bucket_name: &bucket_name,
        assets: &assets,
        layout: &instance_layout,
        backup_schedule: &config.backup_schedule,
    })?;
    info!(
        commands = script.len(),
        steps = script.steps().len(),
        "Composed bootstrap script"
    );

    let record = instance::provision(
        &mut graph,
        ProvisionRequest {
            stack: &layout.server,
            network: &network,
            image: MachineImage::amazon_linux_2(),
            instance_type: &config.instance_type,
            bootstrap: script,
            ssh_key_name: spec.ssh_key_name.clone(),
            principal: &role,
            grants: grants.grant_ids_for(&role),
            floating_ip,
        },
    )?;

    let outputs = vec![(layout.server.clone(), StackOutput::server_ip(&record.endpoint))];
    let assembly = Assembly::build(&graph, &layout, outputs, &record)?;

    info!(
        stacks = assembly.stacks.len(),
        resources = graph.len(),
        bucket = %bucket_name,
        endpoint = %assembly.endpoint,
        "Synthesized deployment"
    );
    Ok(assembly)
}

/// Rights the bootstrap script actually uses, compared with what was granted.
fn review_grants(
    graph: &ResourceGraph,
    grants: &GrantManager,
    bucket: ResourceId,
    assets: &[ResourceId],
) -> Result<Vec<GrantFinding>> {
    let mut required: BTreeMap<ResourceId, BTreeSet<Right>> = BTreeMap::new();
    required.insert(bucket, rights(&[Right::Read, Right::Write, Right::Delete]));
    for asset in assets {
        required.insert(*asset, rights(&[Right::Read]));
    }

    let findings = grants.review(graph, &required)?;
    for finding in &findings {
        tracing::warn!(finding = %finding, "Capability grant mismatch");
    }
    Ok(findings)
}
