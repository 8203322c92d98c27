//! Exchange capability and adapters

use crate::{RawCandle, Timeframe};
use async_trait::async_trait;
use std::time::Duration;

pub mod binance;
pub mod bitmex;
pub mod http;
pub mod pagination;
pub mod shared_resources;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// HTTP request error (5xx and similar)
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response parse error
    #[error("parse error: {0}")]
    ParseError(String),

    /// API error response (4xx: bad symbol, bad timeframe, ...)
    #[error("API error: {0}")]
    ApiError(String),

    /// Rate limit exceeded (429/418)
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// Network error
    #[error("network error: {0}")]
    NetworkError(String),

    /// No response within the per-call deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Timeframe not offered by the exchange
    #[error("timeframe {timeframe} not supported by {exchange}")]
    UnsupportedTimeframe {
        /// Exchange name
        exchange: String,
        /// Requested timeframe
        timeframe: Timeframe,
    },
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Exchange capability consumed by the pagination engine and symbol discovery
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Registry name of the exchange
    fn name(&self) -> &str;

    /// Minimum pause between two history requests
    fn min_request_interval(&self) -> Duration;

    /// Largest page the exchange will return
    fn max_page_size(&self) -> usize;

    /// Whether candles of this timeframe can be requested
    fn supports_timeframe(&self, _timeframe: Timeframe) -> bool {
        true
    }

    /// Fetch up to `limit` candles starting at `since` (inclusive, Unix milliseconds)
    ///
    /// # Arguments
    /// * `symbol` - Unified trading pair (e.g., "BTC/USD")
    /// * `timeframe` - Candle timeframe
    /// * `since` - Start time (Unix timestamp in milliseconds)
    /// * `limit` - Maximum number of items
    ///
    /// # Returns
    /// Raw items in exchange order; incomplete items are returned, not filtered
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
        limit: usize,
    ) -> FetcherResult<Vec<RawCandle>>;

    /// Load the instrument list and return unified `BASE/QUOTE` symbols
    async fn list_symbols(&self) -> FetcherResult<Vec<String>>;
}

/// Parse a JSON number or numeric string into a float
pub(crate) fn json_f64(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
