//! BitMEX adapter
//!
//! History comes from `/api/v1/trade/bucketed`, which only offers the 1m, 5m, 1h
//! and 1d bin sizes. BitMEX names bitcoin `XBT`; the unified form uses `BTC`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::fetcher::http::ExchangeHttpClient;
use crate::fetcher::{json_f64, Exchange, FetcherError, FetcherResult};
use crate::registry::ExchangeEntry;
use crate::{RawCandle, Timeframe};

const BUCKETED_ENDPOINT: &str = "/api/v1/trade/bucketed";
const INSTRUMENTS_ENDPOINT: &str = "/api/v1/instrument/active";

/// Instrument type code of perpetual swaps
const PERPETUAL_TYPE: &str = "FFWCSX";

/// BitMEX REST adapter
pub struct Bitmex {
    entry: ExchangeEntry,
    http: ExchangeHttpClient,
}

impl Bitmex {
    /// Create an adapter for a registry entry
    pub fn new(entry: ExchangeEntry, client: Arc<Client>) -> Self {
        let http = ExchangeHttpClient::new(client, entry.base_url());
        Self { entry, http }
    }

    /// Exchange-native symbol ("BTC/USD" -> "XBTUSD")
    pub fn native_symbol(symbol: &str) -> String {
        match symbol.split_once('/') {
            Some((base, quote)) => {
                format!("{}{}", to_native_currency(base), to_native_currency(quote))
            }
            None => symbol.to_uppercase(),
        }
    }

    /// Parse a bucketed trades response into raw candles
    pub fn parse_buckets(buckets: Vec<Value>) -> Vec<RawCandle> {
        buckets
            .iter()
            .map(|bucket| {
                let timestamp = bucket
                    .get("timestamp")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.timestamp_millis());
                RawCandle::from_fields(
                    timestamp,
                    json_f64(bucket.get("open")),
                    json_f64(bucket.get("high")),
                    json_f64(bucket.get("low")),
                    json_f64(bucket.get("close")),
                    json_f64(bucket.get("volume")),
                )
            })
            .collect()
    }

    /// Parse the active instrument list into unified symbols
    ///
    /// Only perpetuals are listed: they map to a `BASE/QUOTE` pair that
    /// [`Bitmex::native_symbol`] turns back into the same instrument. Dated
    /// contracts have no such pair and cannot be synced.
    pub fn parse_instruments(instruments: &[Value]) -> Vec<String> {
        let mut symbols: Vec<String> = instruments
            .iter()
            .filter_map(|inst| {
                let symbol = inst.get("symbol")?.as_str()?;
                if inst.get("typ").and_then(Value::as_str) != Some(PERPETUAL_TYPE) {
                    debug!(symbol, "Skipping non-perpetual instrument");
                    return None;
                }
                let base = inst.get("underlying")?.as_str()?;
                let quote = inst.get("quoteCurrency")?.as_str()?;
                let unified = format!("{}/{}", to_unified_currency(base), to_unified_currency(quote));
                if Self::native_symbol(&unified) != symbol {
                    debug!(symbol, unified = %unified, "Skipping instrument without a unified pair");
                    return None;
                }
                Some(unified)
            })
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

fn to_native_currency(code: &str) -> String {
    match code.to_uppercase().as_str() {
        "BTC" => "XBT".to_string(),
        other => other.to_string(),
    }
}

fn to_unified_currency(code: &str) -> String {
    match code.to_uppercase().as_str() {
        "XBT" => "BTC".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Exchange for Bitmex {
    fn name(&self) -> &str {
        self.entry.name()
    }

    fn min_request_interval(&self) -> Duration {
        self.entry.rate_limit()
    }

    fn max_page_size(&self) -> usize {
        self.entry.max_page_size()
    }

    fn supports_timeframe(&self, timeframe: Timeframe) -> bool {
        self.entry.supports(timeframe)
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: i64,
        limit: usize,
    ) -> FetcherResult<Vec<RawCandle>> {
        if !self.supports_timeframe(timeframe) {
            return Err(FetcherError::UnsupportedTimeframe {
                exchange: self.name().to_string(),
                timeframe,
            });
        }

        let start = DateTime::<Utc>::from_timestamp_millis(since)
            .ok_or_else(|| FetcherError::ParseError(format!("Invalid start time: {since}")))?
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        let params = [
            ("binSize", timeframe.as_str().to_string()),
            ("symbol", Self::native_symbol(symbol)),
            ("startTime", start),
            ("count", limit.to_string()),
            ("partial", "false".to_string()),
            ("reverse", "false".to_string()),
        ];
        debug!(
            "Fetching buckets: symbol={}, binSize={}, start={}, count={}",
            symbol, timeframe, since, limit
        );

        let buckets: Vec<Value> = self.http.get(BUCKETED_ENDPOINT, &params).await?;
        Ok(Self::parse_buckets(buckets))
    }

    async fn list_symbols(&self) -> FetcherResult<Vec<String>> {
        info!(exchange = %self.name(), "Loading markets");
        let instruments: Vec<Value> = self.http.get(INSTRUMENTS_ENDPOINT, &[]).await?;
        Ok(Self::parse_instruments(&instruments))
    }
}
