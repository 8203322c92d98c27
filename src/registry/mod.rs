//! Registry of supported exchanges
//!
//! The registry is embedded JSON describing each exchange: which adapter family
//! it belongs to, where its API lives, how fast it may be polled and which
//! timeframes it offers. Unknown names are rejected here, before any job runs.

use crate::fetcher::binance::BinanceSpot;
use crate::fetcher::bitmex::Bitmex;
use crate::fetcher::shared_resources::global_http_client;
use crate::fetcher::Exchange;
use crate::Timeframe;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Embedded registry data
const REGISTRY_JSON: &str = include_str!("exchanges.json");

/// Global registry instance (loaded once)
static REGISTRY: Lazy<Result<ExchangeRegistry, RegistryError>> =
    Lazy::new(|| ExchangeRegistry::from_json(REGISTRY_JSON));

/// Adapter family an exchange is served by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    /// Binance-style `/api/v3/klines`
    Binance,
    /// BitMEX `/api/v1/trade/bucketed`
    Bitmex,
}

/// A single exchange entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeEntry {
    name: String,
    kind: ExchangeKind,
    description: String,
    base_url: String,
    rate_limit_ms: u64,
    max_page_size: usize,
    timeframes: Vec<Timeframe>,
}

impl ExchangeEntry {
    /// Registry name (also the store bucket name)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adapter family
    pub fn kind(&self) -> ExchangeKind {
        self.kind
    }

    /// Human readable description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// REST API base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Minimum pause between history requests
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    /// Largest page the exchange returns
    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Offered timeframes
    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// Whether the timeframe is offered
    pub fn supports(&self, timeframe: Timeframe) -> bool {
        self.timeframes.contains(&timeframe)
    }

    /// Build the adapter for this entry
    pub fn build(&self) -> Arc<dyn Exchange> {
        let client = global_http_client();
        match self.kind {
            ExchangeKind::Binance => Arc::new(BinanceSpot::new(self.clone(), client)),
            ExchangeKind::Bitmex => Arc::new(Bitmex::new(self.clone(), client)),
        }
    }
}

/// Registry of supported exchanges
#[derive(Debug, Clone)]
pub struct ExchangeRegistry {
    #[allow(dead_code)]
    schema_version: String,
    entries: BTreeMap<String, ExchangeEntry>,
}

impl ExchangeRegistry {
    /// Load the embedded registry
    ///
    /// This is a singleton operation - the registry is loaded once and cached.
    pub fn load() -> Result<&'static Self, RegistryError> {
        REGISTRY.as_ref().map_err(Clone::clone)
    }

    fn from_json(json: &str) -> Result<Self, RegistryError> {
        let raw: RawRegistry = serde_json::from_str(json)
            .map_err(|e| RegistryError::ParseError(format!("Failed to parse registry: {e}")))?;

        let entries = raw
            .exchanges
            .into_iter()
            .map(|entry| (entry.name.clone(), entry))
            .collect();

        Ok(Self {
            schema_version: raw.schema_version,
            entries,
        })
    }

    /// All entries, sorted by name
    pub fn entries(&self) -> impl Iterator<Item = &ExchangeEntry> {
        self.entries.values()
    }

    /// Look up an exchange by name (case-insensitive)
    pub fn get(&self, name: &str) -> Result<&ExchangeEntry, RegistryError> {
        self.entries
            .get(&name.trim().to_lowercase())
            .ok_or_else(|| RegistryError::UnknownSource(name.to_string()))
    }
}

/// Exchanges selected for a run, keyed by registry name
#[derive(Clone, Default)]
pub struct ExchangeSet {
    exchanges: HashMap<String, Arc<dyn Exchange>>,
}

impl ExchangeSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for the named exchanges
    ///
    /// # Errors
    /// Fails on the first name missing from the registry.
    pub fn from_registry<I, S>(names: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let registry = ExchangeRegistry::load()?;
        let mut set = Self::new();
        for name in names {
            let entry = registry.get(name.as_ref())?;
            set.exchanges.insert(entry.name().to_string(), entry.build());
        }
        Ok(set)
    }

    /// Add an exchange under a name
    pub fn with(mut self, name: impl Into<String>, exchange: Arc<dyn Exchange>) -> Self {
        self.exchanges.insert(name.into().to_lowercase(), exchange);
        self
    }

    /// Exchange registered under `name`
    pub fn get(&self, name: &str) -> Result<Arc<dyn Exchange>, RegistryError> {
        self.exchanges
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownSource(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.exchanges.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of exchanges in the set
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

/// Raw registry structure for deserialization
#[derive(Debug, Deserialize)]
struct RawRegistry {
    schema_version: String,
    exchanges: Vec<ExchangeEntry>,
}

/// Errors that can occur when working with the registry
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// Failed to parse registry JSON
    #[error("registry parse error: {0}")]
    ParseError(String),

    /// Exchange name not in the registry
    #[error("unknown source: {0}")]
    UnknownSource(String),
}
