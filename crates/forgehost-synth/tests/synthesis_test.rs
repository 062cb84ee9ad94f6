// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end synthesis tests against on-disk fixtures.

mod common;

use std::collections::BTreeSet;
use std::fs;

use forgehost_dsl::FloatingIpRef;
use forgehost_synth::bootstrap::steps::{BootstrapStep, PLAN};
use forgehost_synth::{
    AddressRef, AssetError, Resource, Right, SynthConfig, SynthError, SynthesisInput, synthesize,
};

use common::{input, load_spec, resources};

fn commands_for(assembly: &forgehost_synth::Assembly) -> Vec<String> {
    assembly.bootstrap.commands().to_vec()
}

// ============================================================================
// Bootstrap Script
// ============================================================================

#[test]
fn test_fixture_script_order() {
    let dir = resources();
    let assembly = synthesize(&input(load_spec(), &dir)).unwrap();
    let commands = commands_for(&assembly);

    assert_eq!(assembly.bootstrap_steps, PLAN.to_vec());
    assert_eq!(commands.len(), 23, "{:#?}", commands);

    assert_eq!(commands[0], "export AWS_BACKUP_BUCKET=grantapher-minecraft-cdk");
    assert_eq!(commands[1], "export FORGE_VERSION=1.16.3-34.1.34");
    assert!(commands[2].starts_with("grep -qxF 'export AWS_BACKUP_BUCKET=grantapher-minecraft-cdk'"));
    assert!(commands[3].starts_with("grep -qxF 'export FORGE_VERSION=1.16.3-34.1.34'"));
    assert_eq!(commands[4], "sudo yum install -y java-11-amazon-corretto");
    assert_eq!(commands[5], "sudo mkdir -p /minecraft_config");
    assert_eq!(commands[6], "sudo mkdir -p /minecraft_config/bin");
    assert_eq!(commands[7], "sudo mkdir -p /minecraft");
    assert!(commands[8].starts_with("sudo chown -R ") && commands[8].ends_with(" /minecraft_config"));
    assert!(commands[9].starts_with("sudo chown -R ") && commands[9].ends_with(" /minecraft"));
    assert_eq!(commands[10], "cd /minecraft");
    assert!(commands[11].ends_with(" /minecraft/server.properties"));
    assert!(commands[12].ends_with(" /minecraft/mods.zip"));
    assert_eq!(commands[13], "unzip -o /minecraft/mods.zip -d /minecraft");
    assert_eq!(commands[14], "rm -f /minecraft/mods.zip");
    assert!(commands[15].ends_with(" /etc/systemd/system/minecraft.service"));
    assert!(commands[16].ends_with(" /minecraft_config/bin/backup.sh"));
    assert!(commands[17].ends_with(" /minecraft_config/bin/download_previous.sh"));
    assert!(commands[18].ends_with(" /minecraft_config/bin/setup.sh"));
    assert!(commands[19].ends_with(" /minecraft_config/bin"));
    assert_eq!(commands[20], "sudo chmod -R 755 /minecraft_config/bin");
    assert!(commands[21].contains("crontab -"));
    assert_eq!(commands[22], "/minecraft_config/bin/setup.sh");

    for download in &commands[11..19] {
        if download.starts_with("unzip") || download.starts_with("rm") {
            continue;
        }
        assert!(download.contains("aws s3 cp "), "{}", download);
        assert!(download.contains("s3://forgehost-assets/assets/"), "{}", download);
    }
}

#[test]
fn test_user_data_is_rendered_script() {
    let dir = resources();
    let assembly = synthesize(&input(load_spec(), &dir)).unwrap();

    let user_data = &assembly.user_data["forgehost-server"];
    let expected = format!("#!/bin/bash\n{}\n", assembly.bootstrap.commands().join("\n"));
    assert_eq!(user_data, &expected);
}

#[test]
fn test_no_mods_means_no_expansion() {
    let dir = resources();
    let mut spec = load_spec();
    spec.mods_archive_path = None;

    let assembly = synthesize(&input(spec, &dir)).unwrap();
    let commands = commands_for(&assembly);

    assert!(!commands.iter().any(|c| c.contains("unzip")));
    assert!(!commands.iter().any(|c| c.contains("mods.zip")));
    assert!(!assembly.bootstrap_steps.contains(&BootstrapStep::InstallModsArchive));
}

#[test]
fn test_mods_block_between_directories_and_descriptor() {
    let dir = resources();
    let mut spec = load_spec();
    spec.server_config_path = None;

    let assembly = synthesize(&input(spec, &dir)).unwrap();
    let commands = commands_for(&assembly);
    let position = |pred: &dyn Fn(&String) -> bool| {
        let matches: Vec<usize> = commands
            .iter()
            .enumerate()
            .filter(|(_, c)| pred(c))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(matches.len(), 1, "{:#?}", commands);
        matches[0]
    };

    let download = position(&|c| c.contains("aws s3 cp") && c.ends_with("/minecraft/mods.zip"));
    let expand = position(&|c| c.starts_with("unzip"));
    let cleanup = position(&|c| c.starts_with("rm -f"));
    let enter_dir = position(&|c| c == "cd /minecraft");
    let descriptor = position(&|c| c.ends_with("/etc/systemd/system/minecraft.service"));

    assert!(enter_dir < download);
    assert!(download < expand);
    assert!(expand < cleanup);
    assert!(cleanup < descriptor);
}

#[test]
fn test_synthesis_is_deterministic() {
    let dir = resources();
    let first = synthesize(&input(load_spec(), &dir)).unwrap();
    let second = synthesize(&input(load_spec(), &dir)).unwrap();

    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(first.bootstrap.commands(), second.bootstrap.commands());
}

// ============================================================================
// Grants
// ============================================================================

#[test]
fn test_grants_are_exact() {
    let dir = resources();
    let assembly = synthesize(&input(load_spec(), &dir)).unwrap();
    let grants = assembly.grants();

    let asset_ids: BTreeSet<String> = assembly
        .resources()
        .filter(|r| matches!(r.resource, Resource::Asset(_)))
        .map(|r| r.logical_id.clone())
        .collect();
    // overlay, mods, descriptor, three helpers
    assert_eq!(asset_ids.len(), 6);
    assert_eq!(grants.len(), asset_ids.len() + 1);

    for grant in &grants {
        assert_eq!(grant.principal, "InstanceRole");
        if grant.resource == "BackupBucket" {
            assert_eq!(
                grant.rights,
                BTreeSet::from([Right::Read, Right::Write, Right::Delete])
            );
        } else {
            assert!(asset_ids.contains(&grant.resource), "{}", grant.resource);
            assert_eq!(grant.rights, BTreeSet::from([Right::Read]));
        }
    }
}

#[test]
fn test_grants_precede_instance() {
    let dir = resources();
    let assembly = synthesize(&input(load_spec(), &dir)).unwrap();

    let instance = assembly.position("GameServerInstance").unwrap();
    let role = assembly.position("InstanceRole").unwrap();
    assert!(role < instance);
    for resource in assembly.resources() {
        if matches!(resource.resource, Resource::Grant(_)) {
            let grant = assembly.position(&resource.logical_id).unwrap();
            assert!(role < grant && grant < instance, "{}", resource.logical_id);
        }
    }
}

// ============================================================================
// Endpoint and Stacks
// ============================================================================

#[test]
fn test_endpoint_without_floating_ip() {
    let dir = resources();
    let assembly = synthesize(&input(load_spec(), &dir)).unwrap();

    assert_eq!(
        assembly.endpoint.address,
        AddressRef::InstancePublicIp("GameServerInstance".to_string())
    );
    assert_eq!(assembly.endpoint.port, 25565);
    assert!(assembly.stack("forgehost-floating-ip").is_none());

    let server = assembly.stack("forgehost-server").unwrap();
    assert_eq!(server.outputs.len(), 1);
    assert_eq!(server.outputs[0].value, "${GameServerInstance.PublicIp}:25565");
    assert!(!assembly
        .resources()
        .any(|r| matches!(r.resource, Resource::FloatingIpAssociation(_))));
}

#[test]
fn test_endpoint_with_floating_ip() {
    let dir = resources();
    let mut spec = load_spec();
    spec.floating_ip = Some(FloatingIpRef::new("Server IP"));

    let assembly = synthesize(&input(spec, &dir)).unwrap();

    assert_eq!(
        assembly.endpoint.address,
        AddressRef::FloatingIp("FloatingIpServerIP".to_string())
    );
    let ip_stack = assembly.stack("forgehost-floating-ip").unwrap();
    assert_eq!(ip_stack.resources.len(), 1);

    let server = assembly.stack("forgehost-server").unwrap();
    assert!(server.depends_on.contains(&"forgehost-floating-ip".to_string()));
    assert!(server.depends_on.contains(&"forgehost-storage".to_string()));
    assert_eq!(server.outputs[0].value, "${FloatingIpServerIP.PublicIp}:25565");

    let association = assembly.position("FloatingIpAssociation").unwrap();
    assert!(association > assembly.position("GameServerInstance").unwrap());
}

#[test]
fn test_storage_stack_is_retained_with_expiry() {
    let dir = resources();
    let assembly = synthesize(&input(load_spec(), &dir)).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&assembly.to_json().unwrap()).unwrap();

    let storage = &manifest["stacks"][0];
    assert_eq!(storage["name"], "forgehost-storage");
    let bucket = &storage["resources"][0];
    assert_eq!(bucket["type"], "Bucket");
    assert_eq!(bucket["bucketName"], "grantapher-minecraft-cdk");
    assert_eq!(bucket["removalPolicy"], "retain");
    assert_eq!(bucket["lifecycleRules"][0]["prefix"], "backups");
    assert_eq!(bucket["lifecycleRules"][0]["expirationDays"], 30);
}

#[test]
fn test_generated_bucket_name_when_absent() {
    let dir = resources();
    let mut spec = load_spec();
    spec.bucket_name = None;

    let assembly = synthesize(&input(spec, &dir)).unwrap();
    let export = &assembly.bootstrap.commands()[0];
    assert!(export.starts_with("export AWS_BACKUP_BUCKET=forgehost-backups-"), "{}", export);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_asset_fails_synthesis() {
    let dir = resources();
    let mut spec = load_spec();
    spec.mods_archive_path = Some("resources/missing.zip".to_string());

    match synthesize(&input(spec, &dir)) {
        Err(SynthError::Asset(AssetError::AssetNotFound(path))) => {
            assert!(path.ends_with("resources/missing.zip"));
        }
        other => panic!("expected AssetNotFound, got {:?}", other.map(|a| a.endpoint)),
    }
}

#[test]
fn test_missing_helper_fails_synthesis() {
    let dir = resources();
    fs::remove_file(dir.path().join("resources/setup.sh")).unwrap();

    assert!(matches!(
        synthesize(&input(load_spec(), &dir)),
        Err(SynthError::Asset(AssetError::AssetNotFound(_)))
    ));
}

#[test]
fn test_invalid_spec_reports_codes() {
    let dir = resources();
    let mut spec = load_spec();
    spec.package_version = "latest".to_string();
    spec.ssh_key_name = Some("  ".to_string());

    match synthesize(&input(spec, &dir)) {
        Err(SynthError::InvalidSpec(report)) => {
            assert!(report.contains("[E002]"));
            assert!(report.contains("[E006]"));
        }
        other => panic!("expected InvalidSpec, got {:?}", other.map(|a| a.endpoint)),
    }
}

#[test]
fn test_generated_bucket_name_from_invalid_app_name_is_rejected() {
    let dir = resources();
    let mut spec = load_spec();
    spec.bucket_name = None;
    let config = SynthConfig::default().with_app_name("Minecraft_Server");

    match synthesize(&SynthesisInput::new(spec, config).with_base_dir(dir.path())) {
        Err(SynthError::InvalidSpec(report)) => {
            assert!(report.contains("[E004]"), "{}", report);
            assert!(report.contains("Minecraft_Server-backups-"), "{}", report);
        }
        other => panic!("expected InvalidSpec, got {:?}", other.map(|a| a.endpoint)),
    }
}

// ============================================================================
// Assembly Output
// ============================================================================

#[test]
fn test_write_assembly() {
    let dir = resources();
    let out = tempfile::tempdir().unwrap();
    let assembly = synthesize(&input(load_spec(), &dir)).unwrap();

    let written = assembly.write_to(out.path()).unwrap();
    assert_eq!(written.len(), 2);

    let manifest = fs::read_to_string(out.path().join("manifest.json")).unwrap();
    assert_eq!(manifest, assembly.to_json().unwrap());

    let user_data = fs::read_to_string(out.path().join("forgehost-server.user-data.sh")).unwrap();
    assert!(user_data.starts_with("#!/bin/bash\n"));
    assert!(user_data.ends_with("/minecraft_config/bin/setup.sh\n"));
}
