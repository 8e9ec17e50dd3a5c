//! Layered configuration loading: defaults → file → environment → CLI.
//!
//! Grounded on the teacher's `GlobalConfigPatch::overlay` merge pattern,
//! re-targeted at a file+env source instead of a database row, per
//! SPEC_FULL.md's ambient-stack decision.

use std::collections::HashMap;
use std::path::Path;

use driftgate_provider_core::ProviderSettings;
use driftgate_schema::ProviderConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Top-level process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    pub large_payload_threshold_bytes: u64,
    pub prefetch_size_bytes: u64,
    pub drop_excess_requests: bool,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Per-adapter settings (base URLs, Azure API version, ...) keyed by the
    /// same provider name as `providers`. Absent entries fall back to each
    /// adapter's built-in defaults.
    #[serde(default)]
    pub provider_settings: HashMap<String, ProviderSettings>,
}

fn default_large_payload_threshold() -> u64 {
    10 * 1024 * 1024
}

fn default_prefetch_size() -> u64 {
    64 * 1024
}

/// Same shape as `GlobalConfig` but every field optional, so each layer
/// (defaults, file, env, CLI) can be merged with `overlay` — later layers'
/// `Some` values win, exactly like the teacher's `GlobalConfigPatch`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub large_payload_threshold_bytes: Option<u64>,
    pub prefetch_size_bytes: Option<u64>,
    pub drop_excess_requests: Option<bool>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub provider_settings: HashMap<String, ProviderSettings>,
}

impl GlobalConfigPatch {
    /// `other`'s `Some` values win over `self`'s.
    pub fn overlay(mut self, other: GlobalConfigPatch) -> Self {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.large_payload_threshold_bytes.is_some() {
            self.large_payload_threshold_bytes = other.large_payload_threshold_bytes;
        }
        if other.prefetch_size_bytes.is_some() {
            self.prefetch_size_bytes = other.prefetch_size_bytes;
        }
        if other.drop_excess_requests.is_some() {
            self.drop_excess_requests = other.drop_excess_requests;
        }
        for (name, cfg) in other.providers {
            self.providers.insert(name, cfg);
        }
        for (name, settings) in other.provider_settings {
            self.provider_settings.insert(name, settings);
        }
        self
    }

    pub fn into_config(self) -> Result<GlobalConfig, ConfigError> {
        Ok(GlobalConfig {
            host: self.host.unwrap_or_else(|| "0.0.0.0".to_string()),
            port: self.port.unwrap_or(8787),
            large_payload_threshold_bytes: self
                .large_payload_threshold_bytes
                .unwrap_or_else(default_large_payload_threshold),
            prefetch_size_bytes: self
                .prefetch_size_bytes
                .unwrap_or_else(default_prefetch_size),
            drop_excess_requests: self.drop_excess_requests.unwrap_or(false),
            providers: self.providers,
            provider_settings: self.provider_settings,
        })
    }
}

impl From<GlobalConfig> for GlobalConfigPatch {
    fn from(cfg: GlobalConfig) -> Self {
        Self {
            host: Some(cfg.host),
            port: Some(cfg.port),
            large_payload_threshold_bytes: Some(cfg.large_payload_threshold_bytes),
            prefetch_size_bytes: Some(cfg.prefetch_size_bytes),
            drop_excess_requests: Some(cfg.drop_excess_requests),
            providers: cfg.providers,
            provider_settings: cfg.provider_settings,
        }
    }
}

/// Loads config in layered precedence: built-in defaults < an optional
/// YAML/JSON file < environment variables prefixed `DRIFTGATE_` (CLI
/// overrides are applied by the caller on top of the returned patch).
pub fn load(file_path: Option<&Path>) -> Result<GlobalConfigPatch, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = file_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        }
    }
    builder = builder.add_source(
        config::Environment::with_prefix("DRIFTGATE")
            .separator("__")
            .try_parsing(true),
    );
    let built = builder.build()?;
    let patch: GlobalConfigPatch = built.try_deserialize().unwrap_or_default();
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_prefers_later_layer_values() {
        let base = GlobalConfigPatch {
            host: Some("0.0.0.0".into()),
            port: Some(8787),
            ..Default::default()
        };
        let override_layer = GlobalConfigPatch {
            port: Some(9000),
            ..Default::default()
        };
        let merged = base.overlay(override_layer);
        assert_eq!(merged.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(merged.port, Some(9000));
    }

    #[test]
    fn into_config_applies_defaults_for_unset_fields() {
        let cfg = GlobalConfigPatch::default().into_config().unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8787);
        assert_eq!(cfg.large_payload_threshold_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn load_from_missing_file_falls_back_to_env_only() {
        let patch = load(Some(Path::new("/nonexistent/driftgate.yaml"))).unwrap();
        let _ = patch;
    }
}
