//! Sync orchestration and throttling
//!
//! The downloader drives one [`SyncJob`] at a time through the full workflow:
//!
//! 1. **Resolve**: pick the first `since` from the job's [`StartMode`]
//! 2. **Paginate**: pull pages with [`crate::fetcher::pagination::PaginationEngine`]
//! 3. **Write**: validated candles go through [`crate::store::WriteBuffer`],
//!    flushed after every page
//! 4. **Close**: the write session is closed whether the job succeeded or not
//!
//! Jobs never retry: a failed job is reported and the next run picks up from
//! whatever reached the store.
//!
//! # Components
//!
//! - [`executor`] - Job orchestration
//! - [`job`] - Job specifications, status and progress
//! - [`rate_limit`] - Inter-request throttle
//! - [`progress`] - Periodic progress logging
//! - [`config`] - Constants, flush policy and run options

pub mod config;
pub mod executor;
pub mod job;
pub mod progress;
pub mod rate_limit;

pub use config::{FlushPolicy, SyncOptions};
pub use executor::SyncExecutor;
pub use job::{JobProgress, JobReport, JobStatus, SyncJob};
pub use crate::resume::{MissingStartPolicy, StartMode};

use crate::fetcher::FetcherError;
use crate::registry::RegistryError;
use crate::resume::ResolveError;
use crate::store::StoreError;
use crate::Timeframe;

/// Job-level errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Start point could not be resolved
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Exchange not available in this run
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Exchange request failed (including deadline expiry)
    #[error("fetch failed for {source_key} at since={since}: {error}")]
    Fetch {
        /// Source key
        source_key: String,
        /// Cursor position of the failed request
        since: i64,
        /// Underlying fetcher error
        #[source]
        error: FetcherError,
    },

    /// A flush failed under the strict flush policy
    #[error("flush failed for {source_key} after since={since}: {error}")]
    Flush {
        /// Source key
        source_key: String,
        /// Cursor position of the page whose flush failed
        since: i64,
        /// Underlying store error
        #[source]
        error: StoreError,
    },

    /// Timeframe not offered by the exchange
    #[error("timeframe {timeframe} is not supported by {exchange}")]
    UnsupportedTimeframe {
        /// Exchange name
        exchange: String,
        /// Requested timeframe
        timeframe: Timeframe,
    },

    /// Pagination did not terminate within the iteration cap
    #[error("max iterations ({iterations}) exceeded for {source_key} - possible infinite loop. Last since: {since}")]
    MaxIterations {
        /// Source key
        source_key: String,
        /// Pages fetched
        iterations: usize,
        /// Last cursor position
        since: i64,
    },
}
