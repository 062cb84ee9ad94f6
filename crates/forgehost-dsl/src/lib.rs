// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment DSL - Single Source of Truth
//!
//! This crate defines the declarative deployment spec used throughout forgehost:
//! - Deserialization of the user's deployment JSON
//! - Type-safe access to the spec for the synthesizer
//! - JSON Schema export via schemars

mod spec_types;

pub use spec_types::{DSL_VERSION, DeploymentSpec, FloatingIpRef};

// ============================================================================
// Parsing Functions
// ============================================================================

/// Parse a deployment spec from a JSON Value
pub fn parse_deployment_spec(json: &serde_json::Value) -> Result<DeploymentSpec, String> {
    serde_json::from_value(json.clone())
        .map_err(|e| format!("Failed to parse deployment spec: {}", e))
}

/// Parse a deployment spec from JSON text
pub fn parse_deployment_spec_str(json: &str) -> Result<DeploymentSpec, String> {
    serde_json::from_str(json).map_err(|e| format!("Failed to parse deployment spec: {}", e))
}

/// JSON Schema describing [`DeploymentSpec`].
pub fn deployment_spec_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(DeploymentSpec);
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_spec() {
        let json = serde_json::json!({
            "packageVersion": "1.16.3-34.1.34",
            "serverDescriptorPath": "resources/minecraft.service"
        });

        let spec = parse_deployment_spec(&json).unwrap();
        assert_eq!(spec.package_version, "1.16.3-34.1.34");
        assert_eq!(spec.server_descriptor_path, "resources/minecraft.service");
        assert!(spec.bucket_name.is_none());
        assert!(!spec.has_mods_archive());
        assert!(!spec.has_server_config());
        assert!(!spec.has_floating_ip());
    }

    #[test]
    fn test_parse_full_spec() {
        let json = r#"{
            "bucketName": "my-minecraft-backups",
            "packageVersion": "1.16.3-34.1.34",
            "serverDescriptorPath": "resources/minecraft.service",
            "modsArchivePath": "resources/mods.zip",
            "serverConfigPath": "resources/server.properties",
            "sshKeyName": "minecraft-ec2-keypair",
            "floatingIp": { "name": "ServerIp" }
        }"#;

        let spec = parse_deployment_spec_str(json).unwrap();
        assert_eq!(spec.bucket_name.as_deref(), Some("my-minecraft-backups"));
        assert!(spec.has_mods_archive());
        assert!(spec.has_server_config());
        assert_eq!(spec.ssh_key_name.as_deref(), Some("minecraft-ec2-keypair"));
        assert_eq!(spec.floating_ip, Some(FloatingIpRef::new("ServerIp")));
    }

    #[test]
    fn test_missing_required_field_fails() {
        let json = serde_json::json!({
            "serverDescriptorPath": "resources/minecraft.service"
        });

        let result = parse_deployment_spec(&json);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("packageVersion"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = serde_json::json!({
            "packageVersion": "1.0.0",
            "serverDescriptorPath": "a.service",
            "modsZip": "mods.zip"
        });

        assert!(parse_deployment_spec(&json).is_err());
    }

    #[test]
    fn test_optional_fields_omitted_on_serialize() {
        let spec = DeploymentSpec::new("1.0.0", "a.service");
        let value = serde_json::to_value(&spec).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("packageVersion"));
        assert!(obj.contains_key("serverDescriptorPath"));
    }

    #[test]
    fn test_builder_matches_parsed() {
        let built = DeploymentSpec::new("1.0.0", "a.service")
            .with_mods_archive("mods.zip")
            .with_floating_ip("ServerIp");
        let parsed = parse_deployment_spec(&serde_json::to_value(&built).unwrap()).unwrap();

        assert_eq!(built, parsed);
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = deployment_spec_schema();
        let required = schema["required"].as_array().unwrap();
        let names: Vec<&str> = required.iter().filter_map(|v| v.as_str()).collect();

        assert!(names.contains(&"packageVersion"));
        assert!(names.contains(&"serverDescriptorPath"));
        assert!(!names.contains(&"modsArchivePath"));
    }
}
