//! # OHLCV Sync Library
//!
//! Incrementally syncs historical OHLCV candles from cryptocurrency exchanges into a
//! time-series store, resuming from the last persisted candle instead of re-fetching
//! history from scratch.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ohlcv_sync::downloader::{StartMode, SyncExecutor, SyncJob, SyncOptions};
//! use ohlcv_sync::registry::ExchangeSet;
//! use ohlcv_sync::store::influx::InfluxStore;
//! use ohlcv_sync::SourceSpec;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = SourceSpec::parse("bitmex-BTC/USD-1m")?;
//! let exchanges = ExchangeSet::from_registry([source.source()])?;
//! let store = Arc::new(InfluxStore::new("http://localhost:8086", "my-org", "my-token"));
//!
//! let executor = SyncExecutor::new(exchanges, store, SyncOptions::default());
//! let progress = executor
//!     .run_job(SyncJob::new(source, StartMode::resume()))
//!     .await?;
//! println!("wrote {} candles", progress.records_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`identifier`] - `exchange-symbol-timeframe` source keys
//! - [`registry`] - Supported exchanges and their adapters
//! - [`fetcher`] - Exchange capability, HTTP adapters and the pagination engine
//! - [`store`] - Time-series store capability, InfluxDB adapter and write buffer
//! - [`resume`] - Resume-point resolution against the store
//! - [`downloader`] - Job orchestration, throttling and progress
//! - [`config`] - Environment configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Environment configuration
pub mod config;

/// Sync orchestration
pub mod downloader;

/// Exchange adapters and pagination
pub mod fetcher;

/// Source key parsing and validation
pub mod identifier;

/// Metrics collection
pub mod metrics;

/// Exchange registry
pub mod registry;

/// Resume-point resolution
pub mod resume;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Time-series store capability and adapters
pub mod store;

pub use identifier::SourceSpec;

/// Candle timeframe using the unified exchange notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1 minute
    #[serde(rename = "1m")]
    OneMinute,
    /// 3 minutes
    #[serde(rename = "3m")]
    ThreeMinutes,
    /// 5 minutes
    #[serde(rename = "5m")]
    FiveMinutes,
    /// 15 minutes
    #[serde(rename = "15m")]
    FifteenMinutes,
    /// 30 minutes
    #[serde(rename = "30m")]
    ThirtyMinutes,
    /// 1 hour
    #[serde(rename = "1h")]
    OneHour,
    /// 2 hours
    #[serde(rename = "2h")]
    TwoHours,
    /// 4 hours
    #[serde(rename = "4h")]
    FourHours,
    /// 6 hours
    #[serde(rename = "6h")]
    SixHours,
    /// 8 hours
    #[serde(rename = "8h")]
    EightHours,
    /// 12 hours
    #[serde(rename = "12h")]
    TwelveHours,
    /// 1 day
    #[serde(rename = "1d")]
    OneDay,
    /// 3 days
    #[serde(rename = "3d")]
    ThreeDays,
    /// 1 week
    #[serde(rename = "1w")]
    OneWeek,
    /// 1 month
    #[serde(rename = "1M")]
    OneMonth,
}

impl Timeframe {
    /// Candle length in milliseconds
    pub fn to_milliseconds(&self) -> i64 {
        match self {
            Timeframe::OneMinute => 60_000,
            Timeframe::ThreeMinutes => 180_000,
            Timeframe::FiveMinutes => 300_000,
            Timeframe::FifteenMinutes => 900_000,
            Timeframe::ThirtyMinutes => 1_800_000,
            Timeframe::OneHour => 3_600_000,
            Timeframe::TwoHours => 7_200_000,
            Timeframe::FourHours => 14_400_000,
            Timeframe::SixHours => 21_600_000,
            Timeframe::EightHours => 28_800_000,
            Timeframe::TwelveHours => 43_200_000,
            Timeframe::OneDay => 86_400_000,
            Timeframe::ThreeDays => 259_200_000,
            Timeframe::OneWeek => 604_800_000,
            Timeframe::OneMonth => 2_592_000_000, // 30 days
        }
    }

    /// Unified string form ("1m", "1h", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::ThreeMinutes => "3m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::ThirtyMinutes => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::TwoHours => "2h",
            Timeframe::FourHours => "4h",
            Timeframe::SixHours => "6h",
            Timeframe::EightHours => "8h",
            Timeframe::TwelveHours => "12h",
            Timeframe::OneDay => "1d",
            Timeframe::ThreeDays => "3d",
            Timeframe::OneWeek => "1w",
            Timeframe::OneMonth => "1M",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::OneMinute),
            "3m" => Ok(Timeframe::ThreeMinutes),
            "5m" => Ok(Timeframe::FiveMinutes),
            "15m" => Ok(Timeframe::FifteenMinutes),
            "30m" => Ok(Timeframe::ThirtyMinutes),
            "1h" => Ok(Timeframe::OneHour),
            "2h" => Ok(Timeframe::TwoHours),
            "4h" => Ok(Timeframe::FourHours),
            "6h" => Ok(Timeframe::SixHours),
            "8h" => Ok(Timeframe::EightHours),
            "12h" => Ok(Timeframe::TwelveHours),
            "1d" => Ok(Timeframe::OneDay),
            "3d" => Ok(Timeframe::ThreeDays),
            "1w" => Ok(Timeframe::OneWeek),
            "1M" => Ok(Timeframe::OneMonth),
            _ => Err(format!("Invalid timeframe: {s}")),
        }
    }
}

/// Individual fields of a raw candle, used to report what an exchange left out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandleField {
    /// Candle timestamp
    Timestamp,
    /// Open price
    Open,
    /// High price
    High,
    /// Low price
    Low,
    /// Close price
    Close,
    /// Traded volume
    Volume,
}

impl fmt::Display for CandleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandleField::Timestamp => "timestamp",
            CandleField::Open => "open",
            CandleField::High => "high",
            CandleField::Low => "low",
            CandleField::Close => "close",
            CandleField::Volume => "volume",
        };
        f.write_str(s)
    }
}

/// The five numeric values of a candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Traded volume
    pub volume: f64,
}

/// One item of an exchange history page, before validation
///
/// Exchanges occasionally return buckets with empty fields (no trades in the
/// interval, data gaps upstream). Those come through as [`RawCandle::Incomplete`]
/// and are dropped by the pagination engine, but their timestamp still counts
/// towards cursor progress.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCandle {
    /// Every field present and finite
    Complete {
        /// Candle timestamp (Unix milliseconds)
        timestamp: i64,
        /// Price and volume values
        ohlcv: Ohlcv,
    },
    /// At least one field missing or non-finite
    Incomplete {
        /// Candle timestamp if the exchange supplied one
        timestamp: Option<i64>,
        /// Fields that were missing
        missing: Vec<CandleField>,
    },
}

impl RawCandle {
    /// Build a raw candle from optional fields, classifying it as complete or not
    ///
    /// Non-finite numbers (NaN, infinity) are treated as missing.
    pub fn from_fields(
        timestamp: Option<i64>,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        close: Option<f64>,
        volume: Option<f64>,
    ) -> Self {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        let values = [
            (CandleField::Open, finite(open)),
            (CandleField::High, finite(high)),
            (CandleField::Low, finite(low)),
            (CandleField::Close, finite(close)),
            (CandleField::Volume, finite(volume)),
        ];

        let mut missing: Vec<CandleField> = values
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(field, _)| *field)
            .collect();
        if timestamp.is_none() {
            missing.insert(0, CandleField::Timestamp);
        }

        match (timestamp, missing.is_empty()) {
            (Some(timestamp), true) => RawCandle::Complete {
                timestamp,
                ohlcv: Ohlcv {
                    open: values[0].1.unwrap_or_default(),
                    high: values[1].1.unwrap_or_default(),
                    low: values[2].1.unwrap_or_default(),
                    close: values[3].1.unwrap_or_default(),
                    volume: values[4].1.unwrap_or_default(),
                },
            },
            _ => RawCandle::Incomplete { timestamp, missing },
        }
    }

    /// Timestamp of the item, if present
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            RawCandle::Complete { timestamp, .. } => Some(*timestamp),
            RawCandle::Incomplete { timestamp, .. } => *timestamp,
        }
    }

    /// Convert into a normalized record for the given source
    ///
    /// # Errors
    /// Returns the list of missing fields for incomplete items.
    pub fn into_record(self, source: &SourceSpec) -> Result<CandleRecord, Vec<CandleField>> {
        match self {
            RawCandle::Complete { timestamp, ohlcv } => Ok(CandleRecord {
                source: source.source().to_string(),
                symbol: source.symbol().to_string(),
                timeframe: source.timeframe(),
                timestamp,
                open: ohlcv.open,
                high: ohlcv.high,
                low: ohlcv.low,
                close: ohlcv.close,
                volume: ohlcv.volume,
            }),
            RawCandle::Incomplete { missing, .. } => Err(missing),
        }
    }
}

/// Normalized OHLCV candle ready to be written to the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandleRecord {
    /// Exchange name (e.g., "bitmex")
    pub source: String,
    /// Unified trading pair (e.g., "BTC/USD")
    pub symbol: String,
    /// Candle timeframe
    pub timeframe: Timeframe,
    /// Candle timestamp (Unix milliseconds)
    pub timestamp: i64,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Traded volume
    pub volume: f64,
}

impl CandleRecord {
    /// Validate numeric integrity
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ] {
            if !value.is_finite() {
                return Err(format!("{name} must be finite, got {value}"));
            }
        }

        if self.volume < 0.0 {
            return Err(format!("Volume must be non-negative, got {}", self.volume));
        }

        Ok(())
    }
}
