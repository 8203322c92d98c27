//! Sync job structures and status tracking

use crate::fetcher::pagination::{PaginationSummary, StopReason};
use crate::resume::StartMode;
use crate::SourceSpec;
use serde::{Deserialize, Serialize};

/// One source to bring up to date
#[derive(Debug, Clone)]
pub struct SyncJob {
    /// Exchange, symbol and timeframe
    pub source: SourceSpec,
    /// How the first `since` is chosen
    pub start: StartMode,
    /// Upper bound (Unix milliseconds); `None` means "now" at job start
    pub until: Option<i64>,
}

impl SyncJob {
    /// Create a job that runs up to the current time
    pub fn new(source: SourceSpec, start: StartMode) -> Self {
        Self {
            source,
            start,
            until: None,
        }
    }

    /// Bound the job to an explicit end time
    pub fn with_until(mut self, until: i64) -> Self {
        self.until = Some(until);
        self
    }
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job has not started yet
    #[default]
    Pending,
    /// Job is currently running
    InProgress,
    /// Job reached its end time or ran out of new data
    Completed,
    /// Job failed with error
    Failed,
    /// Job stopped on a shutdown request
    Cancelled,
}

/// Job progress tracking
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobProgress {
    /// Current status
    pub status: JobStatus,
    /// First `since` of the job (Unix milliseconds)
    pub since: Option<i64>,
    /// Captured end of the job (Unix milliseconds)
    pub until: Option<i64>,
    /// Cursor position when the job ended
    pub current_position: Option<i64>,
    /// Newest timestamp handed to the store
    pub last_written: Option<i64>,
    /// Number of history requests made
    pub pages_fetched: u64,
    /// Records handed to the write session
    pub records_written: u64,
    /// Raw items dropped for missing or invalid fields
    pub records_dropped: u64,
    /// Items skipped because they were already persisted
    pub duplicates_skipped: u64,
    /// Points confirmed by the store
    pub points_flushed: u64,
    /// Failed flush attempts (including close)
    pub failed_flushes: u64,
    /// Why pagination stopped
    pub stop_reason: Option<StopReason>,
    /// Error message if job failed
    pub error: Option<String>,
}

impl JobProgress {
    /// Fold a pagination summary into the progress
    pub fn absorb(&mut self, summary: &PaginationSummary) {
        self.pages_fetched = summary.pages;
        self.records_written = summary.records_written;
        self.records_dropped = summary.records_dropped;
        self.duplicates_skipped = summary.duplicates_skipped;
        self.last_written = summary.last_written;
        self.stop_reason = Some(summary.stop_reason);
        self.status = match summary.stop_reason {
            StopReason::Cancelled => JobStatus::Cancelled,
            StopReason::ReachedNow | StopReason::NoProgress => JobStatus::Completed,
        };
    }

    /// Share of the `[since, until)` range covered (0-100)
    pub fn percentage(&self) -> Option<f64> {
        let (since, until, position) = (self.since?, self.until?, self.current_position?);
        if until <= since {
            return Some(100.0);
        }
        let done = (position.clamp(since, until) - since) as f64;
        Some(done / (until - since) as f64 * 100.0)
    }
}

/// Outcome of one job in a multi-job run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// Source key (`exchange-symbol-timeframe`)
    pub source: String,
    /// Progress, partial if the job failed
    pub progress: JobProgress,
}

impl JobReport {
    /// Whether the job failed
    pub fn is_failure(&self) -> bool {
        self.progress.status == JobStatus::Failed
    }
}
