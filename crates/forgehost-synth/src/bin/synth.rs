// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment synthesizer CLI
//!
//! Synthesizes a deployment spec into an assembly directory.
//!
//! Usage:
//!
//! ```text
//! forgehost-synth --spec <path> [--output <dir>] [--dry-run]
//! forgehost-synth --print-schema
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};

use forgehost_dsl::{deployment_spec_schema, parse_deployment_spec_str};
use forgehost_synth::config::SynthConfig;
use forgehost_synth::synth::{SynthesisInput, synthesize};

#[derive(Parser)]
#[command(
    name = "forgehost-synth",
    version,
    about = "Synthesize a game server deployment into stacks and a bootstrap script"
)]
struct Args {
    /// Deployment spec (JSON). Relative paths inside it resolve against its directory.
    #[arg(long, value_name = "PATH", required_unless_present = "print_schema")]
    spec: Option<PathBuf>,

    /// Assembly output directory
    #[arg(long, env = "FORGEHOST_OUTPUT_DIR", value_name = "DIR")]
    output: Option<PathBuf>,

    /// Print the manifest instead of writing the assembly
    #[arg(long)]
    dry_run: bool,

    /// Print the JSON schema of the deployment spec and exit
    #[arg(long)]
    print_schema: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forgehost_synth=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let args = Args::parse();

    if args.print_schema {
        println!("{}", serde_json::to_string_pretty(&deployment_spec_schema())?);
        return Ok(());
    }

    let Some(spec_path) = args.spec else {
        bail!("--spec is required");
    };

    let mut config = SynthConfig::from_env()?;
    if let Some(output) = args.output {
        config = config.with_output_dir(output);
    }

    let json = fs::read_to_string(&spec_path)
        .with_context(|| format!("Failed to read deployment spec {}", spec_path.display()))?;
    let spec = parse_deployment_spec_str(&json).map_err(anyhow::Error::msg)?;

    let base_dir = spec_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let output_dir = config.output_dir.clone();

    info!(
        spec = %spec_path.display(),
        app = %config.app_name,
        "Synthesizing deployment"
    );
    let assembly = synthesize(&SynthesisInput::new(spec, config).with_base_dir(base_dir))?;

    if args.dry_run {
        println!("{}", assembly.to_json()?);
    } else {
        let written = assembly.write_to(&output_dir)?;
        for path in written {
            eprintln!("  wrote {}", path.display());
        }
    }

    println!("ServerIp: {}", assembly.endpoint);
    Ok(())
}
