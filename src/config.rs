//! Environment configuration
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file. Command-line flags override them.

use crate::downloader::config::{FlushPolicy, DEFAULT_FETCH_TIMEOUT};
use dotenv::dotenv;
use std::time::Duration;

/// Default InfluxDB endpoint
pub const DEFAULT_INFLUX_URL: &str = "http://localhost:8086";

/// Exchanges synced when no source is given
pub const DEFAULT_SOURCES: &str = "bitmex";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: &'static str,
        /// Parse failure
        reason: String,
    },
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// InfluxDB base URL (`INFLUX_URL`)
    pub influx_url: String,
    /// InfluxDB API token (`INFLUX_TOKEN`)
    pub influx_token: Option<String>,
    /// InfluxDB organization (`INFLUX_ORG`)
    pub influx_org: Option<String>,
    /// Default sources, exchange names or full keys (`SYNC_SOURCES`)
    pub sources: Vec<String>,
    /// Per-call exchange deadline (`FETCH_TIMEOUT_SECS`)
    pub fetch_timeout: Duration,
    /// Failed flush handling (`FLUSH_POLICY`)
    pub flush_policy: FlushPolicy,
}

impl AppConfig {
    /// Load from the environment, reading `.env` first if present
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let fetch_timeout = match non_empty("FETCH_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    name: "FETCH_TIMEOUT_SECS",
                    reason: format!("{e}"),
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_FETCH_TIMEOUT,
        };

        let flush_policy = match non_empty("FLUSH_POLICY") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                name: "FLUSH_POLICY",
                reason,
            })?,
            None => FlushPolicy::default(),
        };

        let sources = non_empty("SYNC_SOURCES")
            .unwrap_or_else(|| DEFAULT_SOURCES.to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            influx_url: non_empty("INFLUX_URL").unwrap_or_else(|| DEFAULT_INFLUX_URL.to_string()),
            influx_token: non_empty("INFLUX_TOKEN"),
            influx_org: non_empty("INFLUX_ORG"),
            sources,
            fetch_timeout,
            flush_policy,
        })
    }

    /// Token and organization, both required to talk to the store
    pub fn store_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let token = self
            .influx_token
            .as_deref()
            .ok_or(ConfigError::Missing("INFLUX_TOKEN"))?;
        let org = self
            .influx_org
            .as_deref()
            .ok_or(ConfigError::Missing("INFLUX_ORG"))?;
        Ok((token, org))
    }
}
