//! Resume-point resolution and idempotent re-runs

use std::collections::HashSet;
use std::sync::Arc;

use ohlcv_sync::downloader::{
    DownloadError, JobStatus, MissingStartPolicy, StartMode, SyncExecutor, SyncJob, SyncOptions,
};
use ohlcv_sync::registry::{ExchangeSet, RegistryError};
use ohlcv_sync::resume::ResolveError;
use ohlcv_sync::store::Point;
use ohlcv_sync::{SourceSpec, Timeframe};

use super::support::{
    kline, minute_candles, source, CapturingStore, HistoryExchange, KlineExchange, EXCHANGE,
    MINUTE, T0,
};

fn executor(exchange: &HistoryExchange, store: &CapturingStore) -> SyncExecutor {
    SyncExecutor::new(
        ExchangeSet::new().with(EXCHANGE, Arc::new(exchange.clone())),
        Arc::new(store.clone()),
        SyncOptions::default(),
    )
}

fn unique_keys(points: &[Point]) -> usize {
    points
        .iter()
        .map(|p| {
            (
                p.tag_value("exchange").unwrap_or_default().to_string(),
                p.tag_value("symbol").unwrap_or_default().to_string(),
                p.tag_value("tf").unwrap_or_default().to_string(),
                p.timestamp_ms(),
            )
        })
        .collect::<HashSet<_>>()
        .len()
}

/// Store holds T0; the second page only repeats its own `since`
#[tokio::test]
async fn test_resume_from_last_stored_close() {
    let exchange = HistoryExchange::new(minute_candles(T0, 6));
    let store = CapturingStore::seeded(&source(), &[T0]);
    let executor = executor(&exchange, &store);

    let job = SyncJob::new(source(), StartMode::resume()).with_until(T0 + 60 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    assert_eq!(exchange.calls(), vec![T0, T0 + 5 * MINUTE]);
    assert_eq!(progress.since, Some(T0));
    assert_eq!(progress.records_written, 5);
    assert_eq!(progress.duplicates_skipped, 2);
    assert_eq!(progress.last_written, Some(T0 + 5 * MINUTE));

    let persisted = store.persisted_timestamps();
    assert_eq!(persisted.last().copied(), Some(T0 + 5 * MINUTE));
    assert_eq!(persisted, (0..6).map(|i| T0 + i * MINUTE).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_resume_without_data_aborts_before_fetching() {
    let exchange = HistoryExchange::new(minute_candles(T0, 3));
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store);

    let err = executor
        .run_job(SyncJob::new(source(), StartMode::resume()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DownloadError::Resolve(ResolveError::NoStartingPoint { .. })
    ));
    assert!(exchange.calls().is_empty());
}

#[tokio::test]
async fn test_resume_without_data_falls_back_to_epoch() {
    let exchange = HistoryExchange::new(minute_candles(T0, 3));
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store);

    let mode = StartMode::Resume {
        on_missing: MissingStartPolicy::Epoch,
    };
    let job = SyncJob::new(source(), mode).with_until(T0 + 60 * MINUTE);
    let progress = executor.run_job(job).await.unwrap();

    assert_eq!(exchange.calls()[0], 0);
    assert_eq!(progress.since, Some(0));
    assert_eq!(store.persisted().len(), 3);
}

/// Data stored for another symbol must not be picked up as a resume point
#[tokio::test]
async fn test_resume_ignores_other_symbols() {
    let other = SourceSpec::new(EXCHANGE, "ETH/USD", Timeframe::OneMinute);
    let exchange = HistoryExchange::new(minute_candles(T0, 3));
    let store = CapturingStore::seeded(&other, &[T0 + 30 * MINUTE]);
    let executor = executor(&exchange, &store);

    let result = executor
        .run_job(SyncJob::new(source(), StartMode::resume()))
        .await;

    assert!(result.is_err());
    assert!(exchange.calls().is_empty());
}

#[tokio::test]
async fn test_rerun_writes_no_duplicate_keys() {
    let store = CapturingStore::new();
    let until = T0 + 60 * MINUTE;

    let first = HistoryExchange::new(minute_candles(T0, 5));
    executor(&first, &store)
        .run_job(SyncJob::new(source(), StartMode::FullHistory).with_until(until))
        .await
        .unwrap();
    assert_eq!(store.persisted().len(), 5);

    // Same history again: nothing new to write
    let second = HistoryExchange::new(minute_candles(T0, 5));
    let progress = executor(&second, &store)
        .run_job(SyncJob::new(source(), StartMode::resume()).with_until(until))
        .await
        .unwrap();
    assert_eq!(second.calls(), vec![T0 + 4 * MINUTE]);
    assert_eq!(progress.records_written, 0);
    assert_eq!(progress.duplicates_skipped, 1);

    // History grew by three candles
    let third = HistoryExchange::new(minute_candles(T0, 8));
    let progress = executor(&third, &store)
        .run_job(SyncJob::new(source(), StartMode::resume()).with_until(until))
        .await
        .unwrap();
    assert_eq!(progress.records_written, 3);

    let points = store.persisted();
    assert_eq!(points.len(), 8);
    assert_eq!(unique_keys(&points), points.len());
}

/// The candle still forming during the first run is written once, with its
/// final close, by the next run
#[tokio::test]
async fn test_forming_candle_is_written_after_it_closes() {
    let store = CapturingStore::new();
    let until = T0 + 60 * MINUTE;
    let forming_at = T0 + 2 * MINUTE;

    let first = KlineExchange::new(
        vec![kline(T0, 98.0), kline(T0 + MINUTE, 99.0), kline(forming_at, 1.0)],
        forming_at + 30_000,
    );
    let progress = SyncExecutor::new(
        ExchangeSet::new().with(EXCHANGE, Arc::new(first)),
        Arc::new(store.clone()),
        SyncOptions::default(),
    )
    .run_job(SyncJob::new(source(), StartMode::FullHistory).with_until(until))
    .await
    .unwrap();
    assert_eq!(progress.records_written, 2);
    assert_eq!(store.persisted_timestamps(), vec![T0, T0 + MINUTE]);

    let second = KlineExchange::new(
        vec![kline(T0, 98.0), kline(T0 + MINUTE, 99.0), kline(forming_at, 2.0)],
        forming_at + 5 * MINUTE,
    );
    let progress = SyncExecutor::new(
        ExchangeSet::new().with(EXCHANGE, Arc::new(second)),
        Arc::new(store.clone()),
        SyncOptions::default(),
    )
    .run_job(SyncJob::new(source(), StartMode::resume()).with_until(until))
    .await
    .unwrap();
    assert_eq!(progress.since, Some(T0 + MINUTE));
    assert_eq!(progress.records_written, 1);

    let boundary: Vec<Point> = store
        .persisted()
        .into_iter()
        .filter(|p| p.timestamp_ms() == forming_at)
        .collect();
    assert_eq!(boundary.len(), 1);
    assert_eq!(boundary[0].field_value("close"), Some(2.0));
}

#[tokio::test]
async fn test_run_all_continues_after_failed_job() {
    let exchange = HistoryExchange::new(minute_candles(T0, 3));
    let store = CapturingStore::new();
    let executor = executor(&exchange, &store);
    let until = T0 + 60 * MINUTE;

    let jobs = vec![
        SyncJob::new(source(), StartMode::resume()).with_until(until),
        SyncJob::new(source(), StartMode::Explicit(T0)).with_until(until),
        SyncJob::new(
            SourceSpec::new("mtgox", "BTC/USD", Timeframe::OneMinute),
            StartMode::Explicit(T0),
        ),
    ];
    let reports = executor.run_all(jobs).await;

    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].progress.status, JobStatus::Failed);
    assert!(reports[0].progress.error.is_some());
    assert_eq!(reports[1].progress.status, JobStatus::Completed);
    assert_eq!(reports[1].progress.records_written, 3);
    assert!(reports[2].is_failure());
    assert_eq!(reports[2].source, "mtgox-BTC/USD-1m");
}

#[tokio::test]
async fn test_unknown_exchange_is_rejected() {
    let Err(err) = ExchangeSet::new().get("mtgox") else {
        panic!("mtgox must not resolve");
    };
    assert!(matches!(err, RegistryError::UnknownSource(name) if name == "mtgox"));

    assert!(ExchangeSet::from_registry(["bitmex", "mtgox"]).is_err());
}
