// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Forgehost Synth - Deployment Spec to Resource Graph and Bootstrap Script
//!
//! This crate turns a declarative deployment spec (see `forgehost-dsl`) for a
//! single-node game server into an assembly: a dependency-ordered resource
//! graph split into deployable stacks, plus the bootstrap script the instance
//! runs once on first boot.
//!
//! # Architecture
//!
//! ```text
//!     ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!     │ Deployment  │      │   Asset     │      │  Bootstrap  │
//!     │    Spec     │─────▶│ Publisher   │─────▶│  Composer   │
//!     │   (JSON)    │      │ (+ grants)  │      │  (steps)    │
//!     └─────────────┘      └─────────────┘      └─────────────┘
//!                                                      │
//!                                                      ▼
//!     ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!     │  Assembly   │◀─────│  Resource   │◀─────│  Instance   │
//!     │ (manifest)  │      │   Graph     │      │ Provisioner │
//!     └─────────────┘      └─────────────┘      └─────────────┘
//! ```
//!
//! # Synthesis Pipeline
//!
//! 1. **Validate**: Coded errors and warnings for the spec
//! 2. **Storage**: Backup bucket with retention, retained on removal
//! 3. **Network**: Isolated network, public subnet, security group
//! 4. **Assets**: Publish local files and grant the instance read access
//! 5. **Compose**: Ordered, idempotent bootstrap commands
//! 6. **Provision**: Instance with rendered user data, optional floating IP
//! 7. **Order**: Topologically sort the graph into per-stack manifests
//!
//! # Usage
//!
//! ```ignore
//! use forgehost_dsl::DeploymentSpec;
//! use forgehost_synth::{SynthConfig, SynthesisInput, synthesize};
//!
//! let spec = DeploymentSpec::new("1.16.3-34.1.34", "resources/minecraft.service")
//!     .with_mods_archive("resources/mods.zip");
//! let assembly = synthesize(&SynthesisInput::new(spec, SynthConfig::from_env()?))?;
//! println!("Connect to {}", assembly.endpoint);
//! ```
//!
//! # Modules
//!
//! - [`assets`]: Content-addressed asset publishing
//! - [`bootstrap`]: Bootstrap script composition
//! - [`graph`]: Resource graph and creation order
//! - [`synth`]: Synthesis orchestration

pub mod assets;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod grants;
pub mod graph;
pub mod instance;
pub mod network;
pub mod shell;
pub mod stack;
pub mod storage;
pub mod synth;
pub mod validation;

pub use assets::{AssetError, AssetPublisher, AssetRef};
pub use bootstrap::{BootstrapScript, ComposeError, ComposeInput, compose};
pub use config::{ConfigError, SynthConfig};
pub use error::{Result, SynthError};
pub use grants::{CapabilityGrant, GrantManager, Right};
pub use graph::{GraphError, Resource, ResourceGraph, ResourceId};
pub use instance::{AddressRef, Endpoint, InstanceRecord};
pub use network::NetworkPolicy;
pub use stack::{Assembly, StackLayout};
pub use synth::{SynthesisInput, synthesize};
pub use validation::{ValidationError, ValidationResult, ValidationWarning, validate_spec};
