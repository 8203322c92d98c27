//! Pagination behavior driven through the sync executor

use std::sync::Arc;
use std::time::Duration;

use ohlcv_sync::downloader::{
    DownloadError, JobStatus, StartMode, SyncExecutor, SyncJob, SyncOptions,
};
use ohlcv_sync::fetcher::pagination::StopReason;
use ohlcv_sync::fetcher::FetcherError;
use ohlcv_sync::registry::ExchangeSet;
use ohlcv_sync::shutdown::ShutdownCoordinator;
use ohlcv_sync::RawCandle;

use super::support::{
    candle, minute_candles, source, CapturingStore, Fault, HistoryExchange, EXCHANGE, MINUTE, T0,
};

fn executor(exchange: &HistoryExchange, store: &CapturingStore, options: SyncOptions) -> SyncExecutor {
    SyncExecutor::new(
        ExchangeSet::new().with(EXCHANGE, Arc::new(exchange.clone())),
        Arc::new(store.clone()),
        options,
    )
}

/// No prior data, full history: the first request starts at the epoch
#[tokio::test]
async fn test_full_history_starts_at_epoch() {
    let exchange = HistoryExchange::new(minute_candles(T0, 5));
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store, SyncOptions::default());

    let job = SyncJob::new(source(), StartMode::FullHistory).with_until(T0 + 60 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    let calls = exchange.calls();
    assert_eq!(calls[0], 0);
    assert_eq!(calls, vec![0, T0 + 4 * MINUTE]);
    assert_eq!(progress.since, Some(0));
    assert_eq!(progress.records_written, 5);
    assert_eq!(progress.status, JobStatus::Completed);
    assert_eq!(progress.stop_reason, Some(StopReason::NoProgress));
    assert_eq!(store.persisted_timestamps(), (0..5).map(|i| T0 + i * MINUTE).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_since_strictly_increases_between_pages() {
    let exchange = HistoryExchange::new(minute_candles(T0, 7)).with_max_page(2);
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store, SyncOptions::default());

    let job = SyncJob::new(source(), StartMode::Explicit(T0)).with_until(T0 + 100 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    let calls = exchange.calls();
    assert_eq!(calls.len(), 7);
    assert!(calls.windows(2).all(|w| w[0] < w[1]), "since must advance: {calls:?}");
    assert_eq!(progress.pages_fetched, 7);
    // Overlapping page boundaries are written once
    assert_eq!(progress.records_written, 7);
    assert_eq!(progress.duplicates_skipped, 6);
    assert_eq!(store.persisted().len(), 7);
}

/// Negative volume fails validation; the candle is counted as dropped
#[tokio::test]
async fn test_negative_volume_candle_is_dropped() {
    let history = vec![
        candle(T0),
        RawCandle::from_fields(
            Some(T0 + MINUTE),
            Some(100.0),
            Some(105.0),
            Some(95.0),
            Some(98.0),
            Some(-5.0),
        ),
        candle(T0 + 2 * MINUTE),
    ];
    let exchange = HistoryExchange::new(history);
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store, SyncOptions::default());

    let job = SyncJob::new(source(), StartMode::Explicit(T0)).with_until(T0 + 60 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    assert_eq!(progress.records_written, 2);
    assert_eq!(progress.records_dropped, 1);
    assert_eq!(store.persisted_timestamps(), vec![T0, T0 + 2 * MINUTE]);
}

/// Requested page size below the exchange maximum bounds every request
#[tokio::test]
async fn test_requested_page_size_limits_each_fetch() {
    let exchange = HistoryExchange::new(minute_candles(T0, 7));
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store, SyncOptions::default().with_page_size(3));

    let job = SyncJob::new(source(), StartMode::Explicit(T0)).with_until(T0 + 100 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    assert_eq!(
        exchange.calls(),
        vec![T0, T0 + 2 * MINUTE, T0 + 4 * MINUTE, T0 + 6 * MINUTE]
    );
    assert_eq!(progress.records_written, 7);
    assert_eq!(progress.duplicates_skipped, 3);
}

/// A page whose last timestamp equals `since` ends the loop with one extra call
#[tokio::test]
async fn test_terminates_within_one_extra_call() {
    let exchange = HistoryExchange::new(minute_candles(T0, 3));
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store, SyncOptions::default());

    let job = SyncJob::new(source(), StartMode::Explicit(T0)).with_until(T0 + 60 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    assert_eq!(exchange.calls(), vec![T0, T0 + 2 * MINUTE]);
    assert_eq!(progress.stop_reason, Some(StopReason::NoProgress));
    assert_eq!(progress.current_position, Some(T0 + 2 * MINUTE));
}

#[tokio::test]
async fn test_stops_when_cursor_reaches_until() {
    let exchange = HistoryExchange::new(minute_candles(T0, 5));
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store, SyncOptions::default());

    let job = SyncJob::new(source(), StartMode::Explicit(T0)).with_until(T0 + 2 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    assert_eq!(exchange.calls(), vec![T0]);
    assert_eq!(progress.stop_reason, Some(StopReason::ReachedNow));
    assert_eq!(progress.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_empty_page_stops_without_writing() {
    let exchange = HistoryExchange::new(Vec::new());
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store, SyncOptions::default());

    let job = SyncJob::new(source(), StartMode::Explicit(T0)).with_until(T0 + 60 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    assert_eq!(exchange.calls(), vec![T0]);
    assert_eq!(progress.records_written, 0);
    assert_eq!(progress.stop_reason, Some(StopReason::NoProgress));
    assert_eq!(store.close_calls(), 1);
}

/// Incomplete candles are dropped; complete ones reach the store unchanged
#[tokio::test]
async fn test_incomplete_candles_are_dropped() {
    let history = vec![
        RawCandle::from_fields(Some(T0), Some(100.0), None, Some(95.0), Some(98.0), Some(10.0)),
        RawCandle::from_fields(
            Some(T0 + MINUTE),
            Some(100.0),
            Some(105.0),
            Some(95.0),
            Some(98.0),
            Some(10.0),
        ),
    ];
    let exchange = HistoryExchange::new(history);
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store, SyncOptions::default());

    let job = SyncJob::new(source(), StartMode::Explicit(T0)).with_until(T0 + 60 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    assert_eq!(progress.records_dropped, 1);
    assert_eq!(progress.records_written, 1);

    let points = store.persisted();
    assert_eq!(points.len(), 1);
    let point = &points[0];
    assert_eq!(point.timestamp_ms(), T0 + MINUTE);
    assert_eq!(point.measurement(), "ohlcv");
    assert_eq!(point.tag_value("exchange"), Some(EXCHANGE));
    assert_eq!(point.tag_value("symbol"), Some("BTC/USD"));
    assert_eq!(point.tag_value("tf"), Some("1m"));
    assert_eq!(point.field_value("open"), Some(100.0));
    assert_eq!(point.field_value("high"), Some(105.0));
    assert_eq!(point.field_value("low"), Some(95.0));
    assert_eq!(point.field_value("close"), Some(98.0));
    assert_eq!(point.field_value("volume"), Some(10.0));
}

/// Dropped items still move the cursor forward
#[tokio::test]
async fn test_page_of_only_incomplete_candles_advances_cursor() {
    let mut history: Vec<RawCandle> = (0..3)
        .map(|i| {
            RawCandle::from_fields(Some(T0 + i * MINUTE), None, None, None, None, None)
        })
        .collect();
    history.push(candle(T0 + 3 * MINUTE));
    let exchange = HistoryExchange::new(history).with_max_page(3);
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store, SyncOptions::default());

    let job = SyncJob::new(source(), StartMode::Explicit(T0)).with_until(T0 + 60 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    assert_eq!(exchange.calls()[..2], [T0, T0 + 2 * MINUTE]);
    // T0+2m is served again on the overlapping second page
    assert_eq!(progress.records_dropped, 4);
    assert_eq!(store.persisted_timestamps(), vec![T0 + 3 * MINUTE]);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_deadline_fails_job() {
    let exchange = HistoryExchange::new(minute_candles(T0, 3)).with_fault(Fault::Hang);
    let store = CapturingStore::new();
    let options = SyncOptions::default().with_fetch_timeout(Some(Duration::from_secs(5)));
    let executor = executor(&exchange, &store, options);

    let job = SyncJob::new(source(), StartMode::Explicit(T0)).with_until(T0 + 60 * MINUTE);
    let err = executor.run_job(job).await.unwrap_err();

    match err {
        DownloadError::Fetch { since, error, .. } => {
            assert_eq!(since, T0);
            assert!(matches!(error, FetcherError::Timeout(d) if d == Duration::from_secs(5)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.close_calls(), 1);
}

#[tokio::test]
async fn test_shutdown_stops_before_next_page() {
    let exchange = HistoryExchange::new(minute_candles(T0, 3));
    let store = CapturingStore::new();
    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();
    let executor = executor(&exchange, &store, SyncOptions::default().with_shutdown(shutdown));

    let job = SyncJob::new(source(), StartMode::Explicit(T0)).with_until(T0 + 60 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    assert!(exchange.calls().is_empty());
    assert_eq!(progress.status, JobStatus::Cancelled);
    assert_eq!(progress.stop_reason, Some(StopReason::Cancelled));
    assert_eq!(store.close_calls(), 1);
}
