// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared fixtures for synthesis integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use forgehost_dsl::{DeploymentSpec, parse_deployment_spec_str};
use forgehost_synth::{SynthConfig, SynthesisInput};
use tempfile::TempDir;

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// The deployment fixture: mods, config overlay and SSH key, no floating IP.
pub fn load_spec() -> DeploymentSpec {
    let path = fixtures_dir().join("deployment.json");
    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    parse_deployment_spec_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse {}: {}", path.display(), e))
}

fn write(dir: &Path, relative: &str, contents: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// A directory holding every file the fixture spec references.
pub fn resources() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "resources/minecraft.service", "[Unit]\nDescription=Game server\n");
    write(dir.path(), "resources/mods.zip", "PK\u{3}\u{4}mods");
    write(dir.path(), "resources/server.properties", "motd=forgehost\n");
    write(dir.path(), "resources/backup.sh", "#!/bin/bash\necho backup\n");
    write(dir.path(), "resources/download_previous.sh", "#!/bin/bash\necho restore\n");
    write(dir.path(), "resources/setup.sh", "#!/bin/bash\necho setup\n");
    dir
}

pub fn input(spec: DeploymentSpec, dir: &TempDir) -> SynthesisInput {
    SynthesisInput::new(spec, SynthConfig::default()).with_base_dir(dir.path())
}
