//! Time-series store capability
//!
//! The sync core only talks to the store through [`TimeSeriesStore`] (resume
//! queries and session creation) and [`WriteSession`] (buffered point writes).
//! [`influx`] provides the InfluxDB 2.x implementation; [`buffer::WriteBuffer`]
//! sits between the pagination engine and a session.

use crate::{CandleRecord, SourceSpec, Timeframe};
use async_trait::async_trait;

pub mod buffer;
pub mod influx;
pub mod line_protocol;

pub use buffer::WriteBuffer;

/// Measurement name used for all candle points
pub const MEASUREMENT: &str = "ohlcv";

/// Tag holding the exchange name
pub const TAG_EXCHANGE: &str = "exchange";
/// Tag holding the unified symbol
pub const TAG_SYMBOL: &str = "symbol";
/// Tag holding the timeframe
pub const TAG_TIMEFRAME: &str = "tf";

/// Field queried to find the resume point
pub const RESUME_FIELD: &str = "close";

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Credentials rejected (HTTP 401)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Non-success HTTP status other than 401
    #[error("HTTP error {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Connection or transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// Session was already closed
    #[error("write session already closed")]
    Closed,
}

impl StoreError {
    /// Map a non-success HTTP status to a store error
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        if status == 401 {
            StoreError::Unauthorized(body)
        } else {
            StoreError::Http { status, body }
        }
    }

    /// Whether the store rejected the credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, StoreError::Unauthorized(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A single time-series point
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, f64)>,
    timestamp: i64,
}

impl Point {
    /// Start a point for the given measurement
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp: 0,
        }
    }

    /// Add a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Add a float field
    pub fn float_field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    /// Set the timestamp (Unix milliseconds)
    pub fn timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp = timestamp_ms;
        self
    }

    /// Measurement name
    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    /// Tags in insertion order
    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    /// Fields in insertion order
    pub fn fields(&self) -> &[(String, f64)] {
        &self.fields
    }

    /// Look up a tag value
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a field value
    pub fn field_value(&self, key: &str) -> Option<f64> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    /// Timestamp (Unix milliseconds)
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp
    }
}

impl From<&CandleRecord> for Point {
    fn from(record: &CandleRecord) -> Self {
        Point::new(MEASUREMENT)
            .tag(TAG_EXCHANGE, record.source.as_str())
            .tag(TAG_SYMBOL, record.symbol.as_str())
            .tag(TAG_TIMEFRAME, record.timeframe.as_str())
            .float_field("open", record.open)
            .float_field("high", record.high)
            .float_field("low", record.low)
            .float_field("close", record.close)
            .float_field("volume", record.volume)
            .timestamp(record.timestamp)
    }
}

/// Filter for the latest point of one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastPointQuery {
    /// Bucket (one per exchange)
    pub bucket: String,
    /// Measurement name
    pub measurement: String,
    /// Exchange tag value
    pub exchange: String,
    /// Symbol tag value
    pub symbol: String,
    /// Timeframe tag value
    pub timeframe: Timeframe,
    /// Field name to look at
    pub field: String,
    /// Inclusive range start (Unix milliseconds)
    pub range_start: i64,
}

impl LastPointQuery {
    /// Query for the last `close` written for a source, searching from `range_start`
    pub fn for_source(source: &SourceSpec, range_start: i64) -> Self {
        Self {
            bucket: source.source().to_string(),
            measurement: MEASUREMENT.to_string(),
            exchange: source.source().to_string(),
            symbol: source.symbol().to_string(),
            timeframe: source.timeframe(),
            field: RESUME_FIELD.to_string(),
            range_start,
        }
    }
}

/// Time-series store capability
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Timestamp of the most recent point matching the query, if any
    async fn query_last(&self, query: &LastPointQuery) -> StoreResult<Option<i64>>;

    /// Open a write session targeting a bucket
    fn open_session(&self, bucket: &str) -> Box<dyn WriteSession>;
}

/// An open, buffered write session
#[async_trait]
pub trait WriteSession: Send {
    /// Buffer a point
    fn write_point(&mut self, point: Point);

    /// Number of buffered, unflushed points
    fn pending(&self) -> usize;

    /// Send all buffered points; returns how many were sent
    ///
    /// Buffered points are handed off even when sending fails; they are not kept
    /// for a later attempt.
    async fn flush(&mut self) -> StoreResult<usize>;

    /// Flush remaining points and finalize the session
    async fn close(&mut self) -> StoreResult<()>;
}

/// Result of a flush attempt, inspected by the caller instead of being raised
#[derive(Debug)]
pub enum FlushOutcome {
    /// Nothing was buffered
    Empty,
    /// Points reached the store
    Flushed {
        /// Number of points sent
        points: usize,
    },
    /// The store rejected the batch or was unreachable
    Failed {
        /// Number of points lost with the batch
        points: usize,
        /// Underlying error
        error: StoreError,
    },
}

impl FlushOutcome {
    /// Whether this outcome represents a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, FlushOutcome::Failed { .. })
    }
}

/// Destination for validated candles produced by the pagination engine
#[async_trait]
pub trait CandleSink: Send {
    /// Hand over one record
    fn write(&mut self, record: &CandleRecord);

    /// Page-level durability checkpoint
    async fn flush(&mut self) -> FlushOutcome;
}
