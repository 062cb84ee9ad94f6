// Copyright (C) 2025 The forgehost developers
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cron jobs installed by the bootstrap script.
//!
//! Jobs are kept in a [`CronTable`] keyed by the script they run, so
//! registering the same script twice is a no-op. On the instance, each job is
//! installed with a check-then-append command that only adds the line when no
//! existing line references the script; [`CronJob::apply_to`] models that
//! command so its effect can be tested without a shell.

use std::collections::BTreeMap;

use crate::shell::{as_user, quote};

/// Cron schedule errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CronError {
    #[error("Cron schedule is empty")]
    EmptySchedule,

    #[error("Cron schedule '{schedule}' has {count} fields, expected 5")]
    FieldCount { schedule: String, count: usize },

    #[error("Cron schedule field '{field}' contains invalid character '{character}'")]
    InvalidCharacter { field: String, character: char },

    #[error("Unknown cron schedule macro '{0}'")]
    UnknownMacro(String),

    #[error("Cron job script '{0}' must be an absolute path without whitespace")]
    InvalidScript(String),
}

const MACROS: &[&str] = &[
    "@reboot",
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

/// A validated cron schedule expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Schedule(String);

impl Schedule {
    /// Parse a five-field expression (`*/15 * * * *`) or an `@` macro.
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(CronError::EmptySchedule);
        }

        if trimmed.starts_with('@') {
            if MACROS.contains(&trimmed) {
                return Ok(Self(trimmed.to_string()));
            }
            return Err(CronError::UnknownMacro(trimmed.to_string()));
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount {
                schedule: trimmed.to_string(),
                count: fields.len(),
            });
        }
        for field in &fields {
            if let Some(character) = field
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '*' | '/' | ',' | '-')))
            {
                return Err(CronError::InvalidCharacter {
                    field: field.to_string(),
                    character,
                });
            }
        }

        // Normalize separators so equal schedules compare equal.
        Ok(Self(fields.join(" ")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recurring script invocation with its output appended to `<script>.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJob {
    pub schedule: Schedule,
    pub script: String,
    pub log: String,
}

impl CronJob {
    pub fn new(schedule: Schedule, script: impl Into<String>) -> Result<Self, CronError> {
        let script = script.into();
        if !script.starts_with('/') || script.chars().any(char::is_whitespace) {
            return Err(CronError::InvalidScript(script));
        }
        let log = format!("{}.log", script);
        Ok(Self {
            schedule,
            script,
            log,
        })
    }

    /// The crontab line for this job.
    pub fn line(&self) -> String {
        format!("{} {} >> {} 2>&1", self.schedule, self.script, self.log)
    }

    /// Shell command installing the job in `user`'s crontab unless a line
    /// already references the script.
    pub fn install_command(&self, user: &str) -> String {
        let list = as_user(user, "crontab -l 2>/dev/null");
        format!(
            "{list} | grep -qF {script} || ({list}; echo {line}) | {install}",
            list = list,
            script = quote(&self.script),
            line = quote(&self.line()),
            install = as_user(user, "crontab -"),
        )
    }

    /// Crontab contents after running [`install_command`](Self::install_command)
    /// against `crontab`.
    pub fn apply_to(&self, crontab: &str) -> String {
        if crontab.lines().any(|line| line.contains(&self.script)) {
            return crontab.to_string();
        }
        let mut updated = crontab.to_string();
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(&self.line());
        updated.push('\n');
        updated
    }
}

/// Named cron jobs, keyed by target script path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CronTable {
    jobs: BTreeMap<String, CronJob>,
}

impl CronTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `job` unless a job for the same script is already registered.
    /// Returns whether the table changed.
    pub fn register(&mut self, job: CronJob) -> bool {
        if self.jobs.contains_key(&job.script) {
            return false;
        }
        self.jobs.insert(job.script.clone(), job);
        true
    }

    /// Union of two tables. Jobs already in `self` win.
    pub fn merge(&mut self, other: CronTable) {
        for (_, job) in other.jobs {
            self.register(job);
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs in script path order.
    pub fn jobs(&self) -> impl Iterator<Item = &CronJob> {
        self.jobs.values()
    }

    /// One install command per job.
    pub fn install_commands(&self, user: &str) -> Vec<String> {
        self.jobs().map(|job| job.install_command(user)).collect()
    }

    /// Crontab contents after running every install command.
    pub fn apply_to(&self, crontab: &str) -> String {
        self.jobs()
            .fold(crontab.to_string(), |current, job| job.apply_to(&current))
    }
}
