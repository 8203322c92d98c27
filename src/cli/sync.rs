//! Sync command implementation

use chrono::{DateTime, NaiveDate};
use clap::Args;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::{Cli, CliError, OutputFormat};
use crate::config::AppConfig;
use crate::downloader::config::{DEFAULT_SYMBOL, DEFAULT_TIMEFRAME};
use crate::downloader::{
    FlushPolicy, JobReport, JobStatus, MissingStartPolicy, StartMode, SyncExecutor, SyncJob,
    SyncOptions,
};
use crate::registry::ExchangeSet;
use crate::shutdown::SharedShutdown;
use crate::store::influx::InfluxStore;
use crate::{SourceSpec, Timeframe};

/// Sync command arguments
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Sources to sync: exchange names (e.g. bitmex) or full keys
    /// (e.g. binance-ETH/USDT-1h). Defaults to SYNC_SOURCES.
    pub sources: Vec<String>,

    /// Symbol for bare exchange names (default: BTC/USD)
    #[arg(long)]
    pub symbol: Option<String>,

    /// Timeframe for bare exchange names (default: 1m)
    #[arg(long)]
    pub timeframe: Option<Timeframe>,

    /// Fetch the full history from the Unix epoch
    #[arg(long, conflicts_with_all = ["year", "since"])]
    pub origin: bool,

    /// Start at January 1st (UTC) of this year
    #[arg(long, conflicts_with = "since")]
    pub year: Option<i32>,

    /// Start time (YYYY-MM-DD or RFC3339)
    #[arg(long)]
    pub since: Option<String>,

    /// End time (YYYY-MM-DD or RFC3339; default: now)
    #[arg(long)]
    pub until: Option<String>,

    /// When resuming and the store has no data, start from the epoch instead of failing
    #[arg(long)]
    pub from_epoch_if_empty: bool,

    /// What a failed flush means: best-effort (keep going) or strict (stop the job)
    #[arg(long)]
    pub flush_policy: Option<FlushPolicy>,

    /// Per-request deadline for exchange calls, in seconds (0 disables)
    #[arg(long)]
    pub fetch_timeout_secs: Option<u64>,
}

impl SyncArgs {
    /// Start mode selected by the flags
    pub fn start_mode(&self) -> Result<StartMode, CliError> {
        if self.origin {
            return Ok(StartMode::FullHistory);
        }
        if let Some(year) = self.year {
            return Ok(StartMode::Explicit(start_of_year(year)?));
        }
        if let Some(since) = &self.since {
            return Ok(StartMode::Explicit(parse_start_time_flexible(since)?));
        }
        let on_missing = if self.from_epoch_if_empty {
            MissingStartPolicy::Epoch
        } else {
            MissingStartPolicy::Abort
        };
        Ok(StartMode::Resume { on_missing })
    }

    /// Explicit end time, if given
    pub fn until_ms(&self) -> Result<Option<i64>, CliError> {
        self.until.as_deref().map(parse_end_time_flexible).transpose()
    }

    /// Resolve the source list; positional sources win over configured defaults
    pub fn resolve_sources(&self, defaults: &[String]) -> Result<Vec<SourceSpec>, CliError> {
        let raw = if self.sources.is_empty() {
            defaults
        } else {
            &self.sources[..]
        };
        if raw.is_empty() {
            return Err(CliError::InvalidArgument("no sources to sync".to_string()));
        }

        let symbol = self.symbol.as_deref().unwrap_or(DEFAULT_SYMBOL);
        let timeframe = self.timeframe.unwrap_or(DEFAULT_TIMEFRAME);

        let mut seen = BTreeSet::new();
        let mut sources = Vec::with_capacity(raw.len());
        for item in raw {
            let spec = if item.contains('-') {
                SourceSpec::parse(item)?
            } else {
                SourceSpec::new(item, symbol, timeframe)
            };
            if seen.insert(spec.to_string()) {
                sources.push(spec);
            }
        }
        Ok(sources)
    }

    /// Jobs for the resolved sources
    pub fn build_jobs(&self, sources: Vec<SourceSpec>) -> Result<Vec<SyncJob>, CliError> {
        let start = self.start_mode()?;
        let until = self.until_ms()?;
        Ok(sources
            .into_iter()
            .map(|source| {
                let job = SyncJob::new(source, start);
                match until {
                    Some(until) => job.with_until(until),
                    None => job,
                }
            })
            .collect())
    }

    /// Run options: flags override the environment
    pub fn sync_options(&self, config: &AppConfig, shutdown: SharedShutdown) -> SyncOptions {
        let fetch_timeout = match self.fetch_timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(config.fetch_timeout).filter(|d| !d.is_zero()),
        };
        SyncOptions::default()
            .with_fetch_timeout(fetch_timeout)
            .with_flush_policy(self.flush_policy.unwrap_or(config.flush_policy))
            .with_shutdown(shutdown)
    }

    /// Execute the sync command
    ///
    /// Unknown exchanges fail before any job runs. Failed jobs are reported and
    /// turn into [`CliError::JobsFailed`] once every job has had its turn.
    pub async fn execute(
        &self,
        cli: &Cli,
        config: &AppConfig,
        shutdown: SharedShutdown,
    ) -> Result<Vec<JobReport>, CliError> {
        let sources = self.resolve_sources(&config.sources)?;
        let names: BTreeSet<&str> = sources.iter().map(SourceSpec::source).collect();
        let exchanges = ExchangeSet::from_registry(names)?;
        let jobs = self.build_jobs(sources)?;

        let (token, org) = config.store_credentials()?;
        let store = Arc::new(InfluxStore::new(&config.influx_url, org, token));
        let executor = SyncExecutor::new(exchanges, store, self.sync_options(config, shutdown));

        info!(jobs = jobs.len(), store = %config.influx_url, "Starting sync run");
        let reports = executor.run_all(jobs).await;

        match cli.output_format {
            OutputFormat::Json => output_json(&reports)?,
            OutputFormat::Human => output_human(&reports),
        }

        let failed = reports.iter().filter(|r| r.is_failure()).count();
        if failed > 0 {
            return Err(CliError::JobsFailed {
                failed,
                total: reports.len(),
            });
        }
        Ok(reports)
    }
}

fn start_of_year(year: i32) -> Result<i64, CliError> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .ok_or_else(|| CliError::InvalidArgument(format!("Invalid year: {year}")))
}

/// Try to parse datetime from RFC3339, assuming UTC when no offset is given
fn try_parse_datetime_rfc3339(input: &str) -> Option<i64> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp_millis());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{input}Z")) {
        return Some(dt.timestamp_millis());
    }

    None
}

/// Parse a start time from YYYY-MM-DD (start of day, UTC) or RFC3339
fn parse_start_time_flexible(input: &str) -> Result<i64, CliError> {
    if let Some(ts) = try_parse_datetime_rfc3339(input) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("Invalid start time: {e}")))?;
    let datetime = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::InvalidArgument("Invalid start time".to_string()))?;
    Ok(datetime.and_utc().timestamp_millis())
}

/// Parse an end time from YYYY-MM-DD (end of day, UTC) or RFC3339
fn parse_end_time_flexible(input: &str) -> Result<i64, CliError> {
    if let Some(ts) = try_parse_datetime_rfc3339(input) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("Invalid end time: {e}")))?;
    let datetime = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| CliError::InvalidArgument("Invalid end time".to_string()))?;
    Ok(datetime.and_utc().timestamp_millis())
}

fn output_json(reports: &[JobReport]) -> Result<(), CliError> {
    let failed = reports.iter().filter(|r| r.is_failure()).count();
    let output = serde_json::json!({
        "success": failed == 0,
        "jobs": reports,
    });
    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|e| CliError::OutputError(format!("Failed to serialize results to JSON: {e}")))?;
    println!("{rendered}");
    Ok(())
}

fn output_human(reports: &[JobReport]) {
    for report in reports {
        let progress = &report.progress;
        match progress.status {
            JobStatus::Failed => {
                eprintln!("\n{} failed!", report.source);
                if let Some(e) = &progress.error {
                    eprintln!("Error: {e}");
                }
                error!(source = %report.source, "Sync failed");
            }
            status => {
                println!("\n{} {}", report.source, status_label(status));
                println!("Pages fetched: {}", progress.pages_fetched);
                println!("Candles written: {}", progress.records_written);
                if progress.records_dropped > 0 {
                    println!("Incomplete candles dropped: {}", progress.records_dropped);
                }
                if progress.failed_flushes > 0 {
                    println!("Failed flushes: {} (see log)", progress.failed_flushes);
                }
            }
        }
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Completed => "is up to date",
        JobStatus::Cancelled => "was interrupted",
        JobStatus::Failed => "failed",
        JobStatus::Pending | JobStatus::InProgress => "did not finish",
    }
}
