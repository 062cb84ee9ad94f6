// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Environment published to the instance.
//!
//! One ordered set of variables drives two outputs: `export` lines for the
//! bootstrap process, and profile lines so that cron jobs started later see
//! the same values.

use std::path::Path;

use super::ComposeError;
use crate::shell::{quote, quote_path};

/// Ordered environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishedEnvironment {
    vars: Vec<(String, String)>,
}

impl PublishedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`. An existing key keeps its position.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ComposeError> {
        validate_key(key)?;
        if value.is_empty() || value.contains(['\n', '\r', '\0']) {
            return Err(ComposeError::InvalidEnvironment {
                key: key.to_string(),
                reason: "value must be a non-empty single line".to_string(),
            });
        }

        match self.vars.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.vars.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `export KEY=value` for each variable.
    pub fn export_lines(&self) -> Vec<String> {
        self.iter()
            .map(|(key, value)| format!("export {}={}", key, quote(value)))
            .collect()
    }

    /// Commands appending each export line to `profile` unless already present.
    pub fn persist_commands(&self, profile: &Path) -> Vec<String> {
        let profile = quote_path(profile);
        self.export_lines()
            .iter()
            .map(|line| {
                let line = quote(line);
                format!(
                    "grep -qxF {line} {profile} || echo {line} >> {profile}",
                    line = line,
                    profile = profile
                )
            })
            .collect()
    }
}

fn validate_key(key: &str) -> Result<(), ComposeError> {
    let mut chars = key.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_uppercase() || c == '_')
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ComposeError::InvalidEnvironment {
            key: key.to_string(),
            reason: "name must match [A-Z_][A-Z0-9_]*".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> PublishedEnvironment {
        let mut env = PublishedEnvironment::new();
        env.set("AWS_BACKUP_BUCKET", "mc-backups").unwrap();
        env.set("FORGE_VERSION", "1.16.3-34.1.34").unwrap();
        env
    }

    #[test]
    fn test_export_lines_keep_insertion_order() {
        assert_eq!(
            env().export_lines(),
            vec![
                "export AWS_BACKUP_BUCKET=mc-backups",
                "export FORGE_VERSION=1.16.3-34.1.34",
            ]
        );
    }

    #[test]
    fn test_persist_commands_mirror_exports() {
        let env = env();
        let persisted = env.persist_commands(Path::new("/home/ec2-user/.bash_profile"));

        assert_eq!(persisted.len(), env.len());
        assert_eq!(
            persisted[0],
            "grep -qxF 'export AWS_BACKUP_BUCKET=mc-backups' /home/ec2-user/.bash_profile \
             || echo 'export AWS_BACKUP_BUCKET=mc-backups' >> /home/ec2-user/.bash_profile"
        );
        for (export, persist) in env.export_lines().iter().zip(&persisted) {
            assert!(persist.contains(&quote(export)));
        }
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut env = env();
        env.set("AWS_BACKUP_BUCKET", "other").unwrap();

        assert_eq!(env.len(), 2);
        assert_eq!(env.get("AWS_BACKUP_BUCKET"), Some("other"));
        assert_eq!(env.iter().next().map(|(k, _)| k), Some("AWS_BACKUP_BUCKET"));
    }

    #[test]
    fn test_values_are_quoted() {
        let mut env = PublishedEnvironment::new();
        env.set("MOTD", "hello $USER").unwrap();
        assert_eq!(env.export_lines(), vec!["export MOTD='hello $USER'"]);
    }

    #[test]
    fn test_invalid_keys_and_values_rejected() {
        let mut env = PublishedEnvironment::new();
        assert!(env.set("lower", "x").is_err());
        assert!(env.set("1ABC", "x").is_err());
        assert!(env.set("A-B", "x").is_err());
        assert!(env.set("EMPTY", "").is_err());
        assert!(env.set("MULTI", "a\nb").is_err());
        assert!(env.is_empty());
    }
}
