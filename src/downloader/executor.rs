//! Sync executor: resolve, paginate, flush, close

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, Instrument};

use crate::downloader::config::SyncOptions;
use crate::downloader::{DownloadError, JobProgress, JobReport, JobStatus, SyncJob};
use crate::fetcher::pagination::{PaginationEngine, SyncCursor};
use crate::metrics::JobMetrics;
use crate::registry::ExchangeSet;
use crate::resume::resolve_start;
use crate::store::{TimeSeriesStore, WriteBuffer};

/// Runs sync jobs against one store
pub struct SyncExecutor {
    exchanges: ExchangeSet,
    store: Arc<dyn TimeSeriesStore>,
    options: SyncOptions,
}

impl SyncExecutor {
    /// Create an executor
    pub fn new(exchanges: ExchangeSet, store: Arc<dyn TimeSeriesStore>, options: SyncOptions) -> Self {
        Self {
            exchanges,
            store,
            options,
        }
    }

    /// Bring one source up to date
    ///
    /// The write session is closed on every path; a failed close is logged
    /// and does not change the job's outcome.
    pub async fn run_job(&self, job: SyncJob) -> Result<JobProgress, DownloadError> {
        let mut progress = JobProgress::default();
        self.run_job_tracked(&job, &mut progress)
            .await
            .map(|()| progress)
    }

    /// Run jobs one after another; a failed job does not stop the rest
    pub async fn run_all(&self, jobs: Vec<SyncJob>) -> Vec<JobReport> {
        let mut reports = Vec::with_capacity(jobs.len());

        for job in jobs {
            let mut progress = JobProgress::default();
            if let Err(e) = self.run_job_tracked(&job, &mut progress).await {
                error!(
                    source = %job.source.source(),
                    symbol = %job.source.symbol(),
                    timeframe = %job.source.timeframe(),
                    since = ?progress.since,
                    until = ?progress.until,
                    position = ?progress.current_position,
                    error = %e,
                    "Sync job failed"
                );
            }
            reports.push(JobReport {
                source: job.source.to_string(),
                progress,
            });
        }

        let failed = reports.iter().filter(|r| r.is_failure()).count();
        info!(jobs = reports.len(), failed, "Sync run finished");
        reports
    }

    async fn run_job_tracked(
        &self,
        job: &SyncJob,
        progress: &mut JobProgress,
    ) -> Result<(), DownloadError> {
        let source = &job.source;
        let span = tracing::info_span!(
            "sync_job",
            source = %source.source(),
            symbol = %source.symbol(),
            timeframe = %source.timeframe()
        );

        async move {
            info!("Starting sync job");
            let job_metrics = JobMetrics::start(source.source(), source.symbol());
            progress.status = JobStatus::InProgress;

            let result = self.execute(job, progress).await;
            match &result {
                Ok(()) => {
                    job_metrics.record_success(progress.records_written);
                    info!(
                        status = ?progress.status,
                        written = progress.records_written,
                        dropped = progress.records_dropped,
                        duplicates = progress.duplicates_skipped,
                        failed_flushes = progress.failed_flushes,
                        "Sync job completed"
                    );
                }
                Err(e) => {
                    progress.status = JobStatus::Failed;
                    progress.error = Some(e.to_string());
                    job_metrics.record_failure(&e.to_string());
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, job: &SyncJob, progress: &mut JobProgress) -> Result<(), DownloadError> {
        let source = &job.source;
        let exchange = self.exchanges.get(source.source())?;
        if !exchange.supports_timeframe(source.timeframe()) {
            return Err(DownloadError::UnsupportedTimeframe {
                exchange: exchange.name().to_string(),
                timeframe: source.timeframe(),
            });
        }

        let start = resolve_start(self.store.as_ref(), source, job.start).await?;
        let now = job.until.unwrap_or_else(|| Utc::now().timestamp_millis());
        progress.since = Some(start.since);
        progress.until = Some(now);

        let mut cursor = match start.persisted_through {
            Some(persisted) => SyncCursor::resuming(start.since, now, persisted),
            None => SyncCursor::new(start.since, now),
        };
        info!(since = start.since, until = now, "Fetching candles");

        let bucket = source.source();
        let mut buffer = WriteBuffer::new(bucket, self.store.open_session(bucket));
        let engine = PaginationEngine::new(&self.options);
        let result = engine
            .run(exchange.as_ref(), source, &mut cursor, &mut buffer)
            .await;

        // Close whatever happened above; close failures are logged by the buffer.
        buffer.close().await;

        progress.current_position = Some(cursor.since);
        progress.records_written = buffer.records_written();
        progress.points_flushed = buffer.points_flushed();
        progress.failed_flushes = buffer.failed_flushes();

        let summary = result?;
        progress.absorb(&summary);
        Ok(())
    }
}
