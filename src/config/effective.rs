//! Effective configuration with full provenance
//!
//! The effective_config captures the merged configuration plus
//! information about where each value came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use cc_serialize::stream::{CHUNK_SIZE_ENV, MAX_CHUNKS_ENV, WRITER_TIMEOUT_ENV};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use super::settings::Settings;

/// Schema version for effective_config
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "build-logic/effective_config@1";

/// Environment variables mapped onto `parallel.*` keys
const ENV_KEYS: &[(&str, &str)] = &[
    (CHUNK_SIZE_ENV, "chunk_size"),
    (MAX_CHUNKS_ENV, "max_chunks"),
    (WRITER_TIMEOUT_ENV, "writer_timeout_seconds"),
];

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    Project,
    Env,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Origin of this source
    pub origin: ConfigOrigin,

    /// File path (None for builtin/env/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/env/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Inputs of [`EffectiveConfig::build`] beyond the built-in defaults
#[derive(Debug, Default)]
pub struct ConfigLayers<'a> {
    /// User config, e.g. `~/.config/build-logic/config.toml`
    pub user: Option<&'a Path>,

    /// Project config, e.g. `./build-logic.toml`
    pub project: Option<&'a Path>,

    /// CLI overrides, already shaped like the merged object
    pub cli: Option<Value>,
}

/// Effective configuration with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build effective config from layers, reading the environment layer
    /// through `env`.
    pub fn build(layers: ConfigLayers<'_>, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut values = Vec::new();
        let mut sources = Vec::new();

        // Layer 1: Built-in defaults
        values.push(BuiltinDefaults::default().to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        });

        // Layers 2 and 3: user and project files
        for (origin, path) in [(ConfigOrigin::User, layers.user), (ConfigOrigin::Project, layers.project)] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let (value, digest) = Self::load_toml_file(path)?;
            values.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        // Layer 4: environment
        if let Some(value) = Self::env_layer(&env)? {
            values.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Env,
                path: None,
                digest: None,
            });
        }

        // Layer 5: CLI overrides
        if let Some(cli) = layers.cli {
            values.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(values);
        Self::validate_config(&merged)?;

        tracing::debug!(sources = sources.len(), "computed effective configuration");
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config: merged,
            sources,
        })
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error in {}: {}", path.display(), e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    /// Convert TOML Value to JSON Value
    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => Value::Array(arr.into_iter().map(Self::toml_to_json).collect()),
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    /// `parallel.*` overrides from the environment. Unlike the stream's own
    /// lookup, values that do not parse are errors here.
    fn env_layer(env: &impl Fn(&str) -> Option<String>) -> Result<Option<Value>, ConfigError> {
        let mut parallel = serde_json::Map::new();
        for (var, key) in ENV_KEYS {
            let Some(raw) = env(var) else { continue };
            let value: u64 = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("{var} must be a positive integer, got {raw:?}"))
            })?;
            parallel.insert(key.to_string(), Value::from(value));
        }
        if parallel.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::json!({ "parallel": parallel })))
    }

    /// Validate configuration values
    fn validate_config(config: &Value) -> Result<(), ConfigError> {
        for key in ["chunk_size", "max_chunks", "writer_timeout_seconds"] {
            if let Some(value) = config.get("parallel").and_then(|p| p.get(key)) {
                if value.as_u64().map_or(true, |v| v == 0) {
                    return Err(ConfigError::ValidationError(format!(
                        "parallel.{key} must be a positive integer"
                    )));
                }
            }
        }

        if let Some(patterns) = config.get("beans").and_then(|b| b.get("ignored_fields")) {
            let patterns = patterns.as_array().ok_or_else(|| {
                ConfigError::ValidationError("beans.ignored_fields must be an array".to_string())
            })?;
            for pattern in patterns {
                let pattern = pattern.as_str().ok_or_else(|| {
                    ConfigError::ValidationError("beans.ignored_fields entries must be strings".to_string())
                })?;
                globset::Glob::new(pattern).map_err(|e| {
                    ConfigError::ValidationError(format!("invalid ignored field pattern {pattern:?}: {e}"))
                })?;
            }
        }

        Ok(())
    }

    /// Typed view of the merged configuration
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        serde_json::from_value(self.config.clone())
            .map_err(|e| ConfigError::ValidationError(format!("invalid configuration: {}", e)))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get a config value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Get a config value as u64
    pub fn get_u64(&self, path: &str) -> Option<u64> {
        self.get(path).and_then(|v| v.as_u64())
    }

    /// Get a config value as string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
