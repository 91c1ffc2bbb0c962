//! Adapter configuration.

use crate::compression::CompressionType;
use memo_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const ENV_COMPRESS: &str = "MEMO_COMPRESS";
pub const ENV_COMPRESSION: &str = "MEMO_COMPRESSION";
pub const ENV_DEFAULT_TTL_SECS: &str = "MEMO_DEFAULT_TTL_SECS";

/// Adapter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Compress payloads before they reach the backend.
    #[serde(default)]
    pub compress: bool,
    /// Codec used when `compress` is set.
    #[serde(default)]
    pub algorithm: CompressionType,
    /// TTL used when a store call does not pass one.
    #[serde(default)]
    pub default_ttl_secs: Option<u64>,
}

impl AdapterConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    /// Load configuration from `MEMO_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_COMPRESS) {
            config.compress = parse_bool(ENV_COMPRESS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_COMPRESSION) {
            config.algorithm = raw.parse()?;
        }
        if let Some(raw) = lookup(ENV_DEFAULT_TTL_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                Error::Configuration(format!(
                    "{} must be a number of seconds: {}",
                    ENV_DEFAULT_TTL_SECS, e
                ))
            })?;
            config.default_ttl_secs = Some(secs);
        }

        Ok(config)
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_algorithm(mut self, algorithm: CompressionType) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_default_ttl_secs(mut self, secs: u64) -> Self {
        self.default_ttl_secs = Some(secs);
        self
    }

    /// Default TTL as a duration. Zero means no TTL.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Configuration(format!(
            "{} must be a boolean, got {:?}",
            name, other
        ))),
    }
}
