//! Binance spot adapter
//!
//! Serves every registry entry of kind `binance` (binance.com, binance.us).

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::fetcher::http::ExchangeHttpClient;
use crate::fetcher::{json_f64, Exchange, FetcherError, FetcherResult};
use crate::registry::ExchangeEntry;
use crate::{RawCandle, Timeframe};

const KLINES_ENDPOINT: &str = "/api/v3/klines";
const EXCHANGE_INFO_ENDPOINT: &str = "/api/v3/exchangeInfo";

/// Binance spot REST adapter
pub struct BinanceSpot {
    entry: ExchangeEntry,
    http: ExchangeHttpClient,
}

impl BinanceSpot {
    /// Create an adapter for a registry entry
    pub fn new(entry: ExchangeEntry, client: Arc<Client>) -> Self {
        let http = ExchangeHttpClient::new(client, entry.base_url());
        Self { entry, http }
    }

    /// Exchange-native symbol ("BTC/USDT" -> "BTCUSDT")
    pub fn native_symbol(symbol: &str) -> String {
        symbol.replace('/', "").to_uppercase()
    }

    /// Parse a klines response into raw candles
    ///
    /// Format: `[open_time, "open", "high", "low", "close", "volume", close_time, ...]`.
    /// Values that are absent or unparsable are reported as missing fields.
    /// A kline whose `close_time` is at or after `now_ms` is still forming: its
    /// close is not final, so it comes back incomplete with only its timestamp.
    pub fn parse_klines(klines: Vec<Value>, now_ms: i64) -> Vec<RawCandle> {
        klines
            .into_iter()
            .map(|kline| match kline.as_array() {
                Some(arr) => {
                    let still_open = arr
                        .get(6)
                        .and_then(Value::as_i64)
                        .is_some_and(|close_time| close_time >= now_ms);
                    let close = if still_open { None } else { json_f64(arr.get(4)) };
                    RawCandle::from_fields(
                        arr.first().and_then(Value::as_i64),
                        json_f64(arr.get(1)),
                        json_f64(arr.get(2)),
                        json_f64(arr.get(3)),
                        close,
                        json_f64(arr.get(5)),
                    )
                }
                None => RawCandle::from_fields(None, None, None, None, None, None),
            })
            .collect()
    }

    /// Parse exchangeInfo into unified symbols of trading pairs
    pub fn parse_exchange_info(body: &Value) -> FetcherResult<Vec<String>> {
        let symbols = body
            .get("symbols")
            .and_then(Value::as_array)
            .ok_or_else(|| FetcherError::ParseError("Missing symbols array".to_string()))?;

        let mut unified: Vec<String> = symbols
            .iter()
            .filter(|s| s.get("status").and_then(Value::as_str) == Some("TRADING"))
            .filter_map(|s| {
                let base = s.get("baseAsset")?.as_str()?;
                let quote = s.get("quoteAsset")?.as_str()?;
                Some(format!("{base}/{quote}"))
            })
            .collect();
        unified.sort();
        unified.dedup();
        Ok(unified)
    }
}

#[async_trait]
impl Exchange for BinanceSpot {
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

        let params = [
            ("symbol", Self::native_symbol(symbol)),
            ("interval", timeframe.as_str().to_string()),
            ("startTime", since.to_string()),
            ("limit", limit.to_string()),
        ];
        debug!(
            "Fetching klines: exchange={}, symbol={}, interval={}, start={}, limit={}",
            self.name(),
            symbol,
            timeframe,
            since,
            limit
        );

        let klines: Vec<Value> = self.http.get(KLINES_ENDPOINT, &params).await?;
        Ok(Self::parse_klines(klines, Utc::now().timestamp_millis()))
    }

    async fn list_symbols(&self) -> FetcherResult<Vec<String>> {
        info!(exchange = %self.name(), "Loading markets");
        let body: Value = self.http.get(EXCHANGE_INFO_ENDPOINT, &[]).await?;
        let symbols = Self::parse_exchange_info(&body)?;
        if symbols.is_empty() {
            warn!(exchange = %self.name(), "Exchange reported no trading symbols");
        }
        Ok(symbols)
    }
}
