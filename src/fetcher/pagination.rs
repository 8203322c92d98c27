//! Pagination engine for exchange history APIs
//!
//! Exchanges serve candle history in pages starting at an inclusive `since`.
//! The engine walks the history forward until it reaches the `now` captured at
//! job start or a page stops advancing the cursor.
//!
//! Safety mechanisms:
//! - per-call deadline around every fetch
//! - empty page / no-progress detection
//! - maximum iteration limit
//! - shutdown check between pages

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::downloader::config::{page_size_for, FlushPolicy, SyncOptions, MAX_ITERATIONS};
use crate::downloader::progress::ProgressTracker;
use crate::downloader::rate_limit::{PauseOutcome, RequestThrottle};
use crate::downloader::DownloadError;
use crate::fetcher::{Exchange, FetcherError, FetcherResult};
use crate::metrics;
use crate::shutdown::SharedShutdown;
use crate::store::{CandleSink, FlushOutcome};
use crate::{RawCandle, SourceSpec};
use std::time::Duration;

/// Position of one job in the exchange history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncCursor {
    /// Start of the next request (Unix milliseconds, inclusive)
    pub since: i64,
    /// End of the job, captured once (Unix milliseconds)
    pub now: i64,
    /// Newest timestamp already persisted or written; items at or below are skipped
    pub written_through: Option<i64>,
}

impl SyncCursor {
    /// Cursor for a fresh start; nothing is known to be persisted
    pub fn new(since: i64, now: i64) -> Self {
        Self {
            since,
            now,
            written_through: None,
        }
    }

    /// Cursor continuing after data already in the store up to `persisted_through`
    pub fn resuming(since: i64, now: i64, persisted_through: i64) -> Self {
        Self {
            since,
            now,
            written_through: Some(persisted_through),
        }
    }

    /// Whether the cursor reached the end of the job
    pub fn is_exhausted(&self) -> bool {
        self.since >= self.now
    }

    fn is_duplicate(&self, timestamp: i64) -> bool {
        self.written_through.is_some_and(|w| timestamp <= w)
    }
}

/// Why pagination ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The cursor reached the captured `now`
    ReachedNow,
    /// A page was empty or did not move the cursor forward
    NoProgress,
    /// Shutdown was requested
    Cancelled,
}

/// Counters of one pagination run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSummary {
    /// Pages fetched
    pub pages: u64,
    /// Records handed to the sink
    pub records_written: u64,
    /// Raw items dropped for missing or invalid fields
    pub records_dropped: u64,
    /// Items at or below the watermark
    pub duplicates_skipped: u64,
    /// Per-page flushes that failed
    pub failed_flushes: u64,
    /// Newest timestamp handed to the sink
    pub last_written: Option<i64>,
    /// Why the loop ended
    pub stop_reason: StopReason,
}

/// Cursor-advancing fetch loop
pub struct PaginationEngine {
    page_size: usize,
    fetch_timeout: Option<Duration>,
    flush_policy: FlushPolicy,
    shutdown: Option<SharedShutdown>,
    progress: ProgressTracker,
}

impl PaginationEngine {
    /// Build an engine from run options
    pub fn new(options: &SyncOptions) -> Self {
        Self {
            page_size: options.page_size,
            fetch_timeout: options.fetch_timeout,
            flush_policy: options.flush_policy,
            shutdown: options.shutdown.clone(),
            progress: options.progress.clone(),
        }
    }

    /// Walk the exchange history from `cursor.since` to `cursor.now`
    ///
    /// The cursor is updated in place so the caller can report where the job
    /// stopped, including on error.
    ///
    /// # Errors
    /// Fetch failures and deadline expiry, a failed flush under
    /// [`FlushPolicy::Strict`], and runaway pagination.
    pub async fn run(
        &self,
        exchange: &dyn Exchange,
        source: &SourceSpec,
        cursor: &mut SyncCursor,
        sink: &mut dyn CandleSink,
    ) -> Result<PaginationSummary, DownloadError> {
        let limit = page_size_for(self.page_size.min(exchange.max_page_size()));
        let throttle = RequestThrottle::new(exchange.min_request_interval());
        let mut progress = self.progress.create_state(cursor.since, cursor.now);
        let mut summary = PaginationSummary {
            pages: 0,
            records_written: 0,
            records_dropped: 0,
            duplicates_skipped: 0,
            failed_flushes: 0,
            last_written: None,
            stop_reason: StopReason::ReachedNow,
        };

        let mut iteration = 0;
        let stop_reason = loop {
            if cursor.is_exhausted() {
                break StopReason::ReachedNow;
            }
            if self.shutdown_requested() {
                break StopReason::Cancelled;
            }
            if iteration >= MAX_ITERATIONS {
                return Err(DownloadError::MaxIterations {
                    source_key: source.to_string(),
                    iterations: iteration,
                    since: cursor.since,
                });
            }
            iteration += 1;

            let since = cursor.since;
            let page = self
                .fetch_page(exchange, source, since, limit)
                .await
                .map_err(|error| DownloadError::Fetch {
                    source_key: source.to_string(),
                    since,
                    error,
                })?;
            summary.pages += 1;
            metrics::record_page_fetched(source.source());

            let Some(last_ts) = page.iter().rev().find_map(RawCandle::timestamp) else {
                debug!(since, "Empty page, stopping");
                break StopReason::NoProgress;
            };

            let raw_count = page.len();
            let (written, dropped, duplicates) = self.write_page(page, source, cursor, sink);
            summary.records_written += written;
            summary.records_dropped += dropped;
            summary.duplicates_skipped += duplicates;
            if written > 0 {
                summary.last_written = cursor.written_through;
            }
            metrics::record_page_candles(source.source(), written, dropped);

            info!(
                "Found {} OHLCV datapoints in {} for {} ({} new)",
                raw_count,
                source.source(),
                source.symbol(),
                written
            );

            if let FlushOutcome::Failed { error, .. } = sink.flush().await {
                summary.failed_flushes += 1;
                if self.flush_policy == FlushPolicy::Strict {
                    return Err(DownloadError::Flush {
                        source_key: source.to_string(),
                        since,
                        error,
                    });
                }
            }

            progress.update(written, last_ts);
            if progress.should_emit_update() {
                info!("{}", progress.format_progress());
                progress.mark_emitted();
            }

            if last_ts <= since {
                debug!(since, last_ts, "Page did not advance the cursor, stopping");
                break StopReason::NoProgress;
            }

            info!("Successful fetch from {} to {}", since, last_ts);
            cursor.since = last_ts;

            if cursor.is_exhausted() {
                break StopReason::ReachedNow;
            }
            if throttle.pause(self.shutdown.as_ref()).await == PauseOutcome::Interrupted {
                break StopReason::Cancelled;
            }
        };
        summary.stop_reason = stop_reason;

        if stop_reason == StopReason::Cancelled {
            warn!(since = cursor.since, "Pagination cancelled by shutdown request");
        }
        Ok(summary)
    }

    async fn fetch_page(
        &self,
        exchange: &dyn Exchange,
        source: &SourceSpec,
        since: i64,
        limit: usize,
    ) -> FetcherResult<Vec<RawCandle>> {
        let request = exchange.fetch_candles(source.symbol(), source.timeframe(), since, limit);
        match self.fetch_timeout {
            Some(deadline) => tokio::time::timeout(deadline, request)
                .await
                .map_err(|_| FetcherError::Timeout(deadline))?,
            None => request.await,
        }
    }

    /// Validate and hand a page to the sink; returns (written, dropped, duplicates)
    fn write_page(
        &self,
        page: Vec<RawCandle>,
        source: &SourceSpec,
        cursor: &mut SyncCursor,
        sink: &mut dyn CandleSink,
    ) -> (u64, u64, u64) {
        let (mut written, mut dropped, mut duplicates) = (0, 0, 0);

        for raw in page {
            let record = match raw.into_record(source) {
                Ok(record) => record,
                Err(missing) => {
                    let fields: Vec<String> = missing.iter().map(ToString::to_string).collect();
                    debug!(missing = %fields.join(","), "Dropping incomplete candle");
                    dropped += 1;
                    continue;
                }
            };

            if cursor.is_duplicate(record.timestamp) {
                duplicates += 1;
                continue;
            }

            if let Err(reason) = record.validate() {
                warn!(
                    source = %source,
                    timestamp = record.timestamp,
                    reason = %reason,
                    "Dropping invalid candle"
                );
                dropped += 1;
                continue;
            }

            sink.write(&record);
            written += 1;
            cursor.written_through = Some(
                cursor
                    .written_through
                    .map_or(record.timestamp, |w| w.max(record.timestamp)),
            );
        }

        (written, dropped, duplicates)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }
}
