//! Sync configuration constants and per-run options

use crate::downloader::progress::ProgressTracker;
use crate::shutdown::{self, SharedShutdown};
use crate::Timeframe;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Candles requested per page, clamped to the exchange's maximum.
pub const PAGE_SIZE: usize = 750;

/// Hard cap on pages per job.
/// 100,000 pages of 750 one-minute candles is ~140 years of history, so hitting
/// the cap means the cursor is not advancing as expected.
pub const MAX_ITERATIONS: usize = 100_000;

/// Default per-call deadline for exchange requests.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Symbol used when a bare exchange name is given
pub const DEFAULT_SYMBOL: &str = "BTC/USD";

/// Timeframe used when a bare exchange name is given
pub const DEFAULT_TIMEFRAME: Timeframe = Timeframe::OneMinute;

/// Effective page size for an exchange
pub fn page_size_for(max_page_size: usize) -> usize {
    PAGE_SIZE.min(max_page_size).max(1)
}

/// What a failed flush means for the running job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushPolicy {
    /// Log and count the failure, keep paginating
    #[default]
    BestEffort,
    /// Stop the job; the next run resumes from the last durable point
    Strict,
}

impl fmt::Display for FlushPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushPolicy::BestEffort => f.write_str("best-effort"),
            FlushPolicy::Strict => f.write_str("strict"),
        }
    }
}

impl FromStr for FlushPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "best-effort" | "best_effort" | "besteffort" => Ok(FlushPolicy::BestEffort),
            "strict" => Ok(FlushPolicy::Strict),
            other => Err(format!(
                "Invalid flush policy: {other}. Expected best-effort or strict"
            )),
        }
    }
}

/// Options shared by every job of a run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Per-call deadline for exchange requests (`None` = no deadline)
    pub fetch_timeout: Option<Duration>,
    /// Failed flush handling
    pub flush_policy: FlushPolicy,
    /// Candles per page before clamping to the exchange maximum
    pub page_size: usize,
    /// Shutdown signal checked between pages
    pub shutdown: Option<SharedShutdown>,
    /// Progress log cadence
    pub progress: ProgressTracker,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            flush_policy: FlushPolicy::default(),
            page_size: PAGE_SIZE,
            shutdown: shutdown::get_global_shutdown(),
            progress: ProgressTracker::default(),
        }
    }
}

impl SyncOptions {
    /// Set the per-call fetch deadline
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the flush policy
    pub fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    /// Set the requested page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Attach a shutdown coordinator
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }
}
