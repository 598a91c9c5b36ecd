// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller configuration.
//!
//! Built once at startup from the YAML file merged with environment
//! fall-backs, then treated as an immutable value for the process
//! lifetime. Reconfiguration requires a restart.

use crate::parse::interpolate_env;
use ghr_core::catalog::ImageRef;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from configuration loading or validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("environment variable ${{{0}}} used in the config is not defined")]
    UndefinedEnvVar(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A standby pool: keep `count` warm runners matching `labels`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StandbyGroup {
    pub labels: Vec<String>,
    #[serde(default = "default_standby_count")]
    pub count: usize,
    #[serde(default = "default_true")]
    pub replenish_immediately: bool,
}

/// A per-label-set cap: at most `max` servers whose labels contain `labels`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelCap {
    pub labels: Vec<String>,
    pub max: usize,
}

/// Program configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub github_token: String,
    #[serde(default)]
    pub github_repository: String,
    #[serde(default)]
    pub hetzner_token: String,

    #[serde(default = "default_ssh_key")]
    pub ssh_key: PathBuf,
    #[serde(default)]
    pub additional_ssh_keys: Vec<PathBuf>,

    #[serde(default = "default_with_label")]
    pub with_label: Vec<String>,
    #[serde(default)]
    pub label_prefix: String,
    #[serde(default)]
    pub meta_label: HashMap<String, Vec<String>>,

    #[serde(default = "default_true")]
    pub recycle: bool,
    #[serde(default = "default_end_of_life")]
    pub end_of_life: u64,
    #[serde(default)]
    pub delete_random: bool,

    #[serde(default = "default_max_runners")]
    pub max_runners: usize,
    #[serde(default)]
    pub max_runners_for_label: Vec<LabelCap>,
    #[serde(default)]
    pub max_runners_in_workflow_run: Option<usize>,

    #[serde(default = "default_image")]
    pub default_image: ImageRef,
    #[serde(default = "default_server_type")]
    pub default_server_type: String,
    #[serde(default)]
    pub default_location: Option<String>,

    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub scripts: Option<PathBuf>,

    #[serde(default = "default_max_powered_off_time")]
    pub max_powered_off_time: u64,
    #[serde(default = "default_two_minutes")]
    pub max_unused_runner_time: u64,
    #[serde(default = "default_two_minutes")]
    pub max_runner_registration_time: u64,
    #[serde(default = "default_two_minutes")]
    pub max_server_ready_time: u64,

    #[serde(default = "default_interval")]
    pub scale_up_interval: u64,
    #[serde(default = "default_interval")]
    pub scale_down_interval: u64,

    #[serde(default)]
    pub standby_runners: Vec<StandbyGroup>,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_terminate_timeout")]
    pub terminate_timeout: u64,
}

fn default_true() -> bool {
    true
}
fn default_standby_count() -> usize {
    1
}
fn default_ssh_key() -> PathBuf {
    expand_home("~/.ssh/id_rsa.pub")
}
fn default_with_label() -> Vec<String> {
    vec!["self-hosted".to_string()]
}
fn default_end_of_life() -> u64 {
    50
}
fn default_max_runners() -> usize {
    10
}
fn default_image() -> ImageRef {
    use ghr_core::catalog::{Arch, ImageKind};
    ImageRef::new(Arch::X86, ImageKind::System, "ubuntu-22.04")
}
fn default_server_type() -> String {
    "cx22".to_string()
}
fn default_workers() -> usize {
    10
}
fn default_max_powered_off_time() -> u64 {
    60
}
fn default_two_minutes() -> u64 {
    120
}
fn default_interval() -> u64 {
    15
}
fn default_cache_dir() -> PathBuf {
    expand_home("~/.cache/ghr")
}
fn default_terminate_timeout() -> u64 {
    60
}

/// Expand a leading `~/` using `$HOME`.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// YAML wrapper: the file's single top-level key is `config`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    config: Config,
}

impl Default for Config {
    fn default() -> Self {
        // An empty mapping deserializes to all defaults.
        #[allow(clippy::expect_used)]
        let config: Config = serde_yaml::from_str("{}").expect("empty config deserializes");
        config
    }
}

impl Config {
    /// Load from a YAML file: interpolate `${ENV}` placeholders, parse,
    /// apply credential fall-backs, validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse from YAML text (same pipeline as [`Config::load`]).
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env(raw)?;
        let file: ConfigFile = serde_yaml::from_str(&interpolated)?;
        let mut config = file.config;
        config.apply_env_fallbacks();
        config.validate()?;
        Ok(config)
    }

    /// Fill missing credentials from the environment.
    fn apply_env_fallbacks(&mut self) {
        if self.github_token.is_empty() {
            self.github_token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
        }
        if self.github_repository.is_empty() {
            self.github_repository = std::env::var("GITHUB_REPOSITORY").unwrap_or_default();
        }
        if self.hetzner_token.is_empty() {
            self.hetzner_token = std::env::var("HETZNER_TOKEN").unwrap_or_default();
        }
    }

    /// Check invariants that must hold before the controller starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github_token.is_empty() {
            return Err(ConfigError::Invalid(
                "github_token is not set (config or GITHUB_TOKEN)".to_string(),
            ));
        }
        if self.hetzner_token.is_empty() {
            return Err(ConfigError::Invalid(
                "hetzner_token is not set (config or HETZNER_TOKEN)".to_string(),
            ));
        }
        let repo_parts: Vec<&str> = self.github_repository.split('/').collect();
        if repo_parts.len() != 2 || repo_parts.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "github_repository must be owner/name, got '{}'",
                self.github_repository
            )));
        }
        if !(1..=59).contains(&self.end_of_life) {
            return Err(ConfigError::Invalid(format!(
                "end_of_life must be within 1..59 minutes, got {}",
                self.end_of_life
            )));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.scale_up_interval == 0 || self.scale_down_interval == 0 {
            return Err(ConfigError::Invalid(
                "scale intervals must be at least 1 second".to_string(),
            ));
        }
        if self.max_runners == 0 {
            return Err(ConfigError::Invalid(
                "max_runners must be at least 1".to_string(),
            ));
        }
        for cap in &self.max_runners_for_label {
            if cap.labels.is_empty() {
                return Err(ConfigError::Invalid(
                    "max_runners_for_label entries need a non-empty label set".to_string(),
                ));
            }
        }
        for group in &self.standby_runners {
            if group.labels.is_empty() {
                return Err(ConfigError::Invalid(
                    "standby_runners entries need a non-empty label set".to_string(),
                ));
            }
        }
        if self.scripts.is_none() {
            // The bootstrap pipeline always needs setup.sh and a startup
            // script; there is no usable built-in fallback.
            return Err(ConfigError::Invalid(
                "scripts directory is not configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Owner part of `owner/name`.
    pub fn repository_owner(&self) -> &str {
        self.github_repository
            .split('/')
            .next()
            .unwrap_or_default()
    }

    /// Configured SSH public key paths, primary first.
    pub fn ssh_key_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.ssh_key.clone()];
        paths.extend(self.additional_ssh_keys.iter().cloned());
        paths
    }

    /// Lowercased `with_label` filter.
    pub fn with_label_lower(&self) -> Vec<String> {
        self.with_label.iter().map(|l| l.to_lowercase()).collect()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
