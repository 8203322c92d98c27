//! Observability metrics for candle sync jobs
//!
//! Uses the `metrics` facade; when `--metrics-addr` is given a Prometheus
//! exporter serves the scrape endpoint. Without an installed recorder every
//! macro call is a no-op, so recording is always safe.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{debug, info};

static METRICS_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Install the Prometheus exporter and register metric descriptions
///
/// Idempotent: later calls are ignored.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INITIALIZED.get().is_some() {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "exchange_pages_fetched_total",
        Unit::Count,
        "History pages fetched from exchanges"
    );
    describe_counter!(
        "candles_written_total",
        Unit::Count,
        "Candles handed to the store write session"
    );
    describe_counter!(
        "candles_dropped_total",
        Unit::Count,
        "Raw candles dropped because of missing fields"
    );
    describe_counter!(
        "store_flushes_total",
        Unit::Count,
        "Flush attempts against the store, labelled by outcome"
    );
    describe_counter!(
        "sync_jobs_total",
        Unit::Count,
        "Completed sync jobs, labelled by outcome"
    );
    describe_histogram!(
        "sync_job_duration_seconds",
        Unit::Seconds,
        "Wall-clock duration of sync jobs"
    );

    let _ = METRICS_INITIALIZED.set(());
    Ok(())
}

/// Count one fetched page
pub fn record_page_fetched(source: &str) {
    counter!("exchange_pages_fetched_total", "source" => source.to_string()).increment(1);
}

/// Count candles handed to the store and candles dropped during validation
pub fn record_page_candles(source: &str, written: u64, dropped: u64) {
    if written > 0 {
        counter!("candles_written_total", "source" => source.to_string()).increment(written);
    }
    if dropped > 0 {
        counter!("candles_dropped_total", "source" => source.to_string()).increment(dropped);
    }
}

/// Count one flush attempt
pub fn record_flush(bucket: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("store_flushes_total", "bucket" => bucket.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Tracks duration and outcome of a single sync job
pub struct JobMetrics {
    source: String,
    symbol: String,
    started: Instant,
}

impl JobMetrics {
    /// Start timing a job
    pub fn start(source: &str, symbol: &str) -> Self {
        Self {
            source: source.to_string(),
            symbol: symbol.to_string(),
            started: Instant::now(),
        }
    }

    /// Record a finished job
    pub fn record_success(self, records: u64) {
        self.finish("success");
        debug!(
            source = %self.source,
            symbol = %self.symbol,
            records,
            "Recorded job success metrics"
        );
    }

    /// Record a failed job
    pub fn record_failure(self, error: &str) {
        self.finish("failure");
        debug!(
            source = %self.source,
            symbol = %self.symbol,
            error,
            "Recorded job failure metrics"
        );
    }

    fn finish(&self, outcome: &'static str) {
        counter!(
            "sync_jobs_total",
            "source" => self.source.clone(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!("sync_job_duration_seconds", "source" => self.source.clone())
            .record(self.started.elapsed().as_secs_f64());
    }
}
