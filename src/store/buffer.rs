//! Write buffer / flush controller
//!
//! Converts candle records into points, hands them to the job's write session and
//! turns session errors into [`FlushOutcome`] values. Failures are logged here and
//! never raised; the caller decides what a failed flush means for the job.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::{CandleSink, FlushOutcome, Point, StoreError, WriteSession};
use crate::metrics;
use crate::CandleRecord;

/// Buffered writer owning one store session
pub struct WriteBuffer {
    session: Box<dyn WriteSession>,
    bucket: String,
    records_written: u64,
    points_flushed: u64,
    failed_flushes: u64,
    closed: bool,
}

impl WriteBuffer {
    /// Wrap an open session
    pub fn new(bucket: impl Into<String>, session: Box<dyn WriteSession>) -> Self {
        Self {
            session,
            bucket: bucket.into(),
            records_written: 0,
            points_flushed: 0,
            failed_flushes: 0,
            closed: false,
        }
    }

    /// Records handed to the session so far
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Points confirmed by the store
    pub fn points_flushed(&self) -> u64 {
        self.points_flushed
    }

    /// Number of failed flush attempts (including close)
    pub fn failed_flushes(&self) -> u64 {
        self.failed_flushes
    }

    /// Finalize the session, flushing whatever is left
    ///
    /// Safe to call more than once; later calls return [`FlushOutcome::Empty`].
    pub async fn close(&mut self) -> FlushOutcome {
        if self.closed {
            return FlushOutcome::Empty;
        }
        self.closed = true;

        let pending = self.session.pending();
        match self.session.close().await {
            Ok(()) => {
                self.points_flushed += pending as u64;
                metrics::record_flush(&self.bucket, true);
                info!(bucket = %self.bucket, points = pending, "All data saved");
                if pending == 0 {
                    FlushOutcome::Empty
                } else {
                    FlushOutcome::Flushed { points: pending }
                }
            }
            Err(error) => {
                self.failed_flushes += 1;
                metrics::record_flush(&self.bucket, false);
                self.log_failure("close", pending, &error);
                warn!(bucket = %self.bucket, "Finished with errors");
                FlushOutcome::Failed {
                    points: pending,
                    error,
                }
            }
        }
    }

    fn log_failure(&self, action: &str, points: usize, error: &StoreError) {
        error!(
            bucket = %self.bucket,
            points,
            error = %error,
            "Store {} failed",
            action
        );
        if error.is_unauthorized() {
            info!(
                "The store rejected the credentials: set up an InfluxDB bucket named '{}' and a token with write access (INFLUX_TOKEN, INFLUX_ORG)",
                self.bucket
            );
        }
    }
}

#[async_trait]
impl CandleSink for WriteBuffer {
    fn write(&mut self, record: &CandleRecord) {
        if self.closed {
            warn!(bucket = %self.bucket, "Dropping record written after close");
            return;
        }
        self.session.write_point(Point::from(record));
        self.records_written += 1;
    }

    async fn flush(&mut self) -> FlushOutcome {
        if self.closed {
            return FlushOutcome::Empty;
        }

        let pending = self.session.pending();
        if pending == 0 {
            return FlushOutcome::Empty;
        }

        match self.session.flush().await {
            Ok(points) => {
                self.points_flushed += points as u64;
                metrics::record_flush(&self.bucket, true);
                debug!(bucket = %self.bucket, points, "Batch saved");
                FlushOutcome::Flushed { points }
            }
            Err(error) => {
                self.failed_flushes += 1;
                metrics::record_flush(&self.bucket, false);
                self.log_failure("flush", pending, &error);
                FlushOutcome::Failed {
                    points: pending,
                    error,
                }
            }
        }
    }
}
