//! Source keys and timeframe notation

use ohlcv_sync::identifier::IdentifierError;
use ohlcv_sync::registry::ExchangeRegistry;
use ohlcv_sync::{SourceSpec, Timeframe};

#[test]
fn test_keys_for_every_registry_exchange() {
    let registry = ExchangeRegistry::load().unwrap();
    for entry in registry.entries() {
        let key = format!("{}-BTC/USD-1m", entry.name());
        let spec: SourceSpec = key.parse().unwrap();
        assert_eq!(spec.source(), entry.name());
        assert!(registry.get(spec.source()).is_ok());
    }
}

#[test]
fn test_timeframe_round_trips_through_key() {
    for tf in ["1m", "5m", "1h", "4h", "1d", "1w", "1M"] {
        let spec = SourceSpec::parse(&format!("bitmex-BTC/USD-{tf}")).unwrap();
        assert_eq!(spec.timeframe().as_str(), tf);
        assert!(spec.to_string().ends_with(tf));
    }
}

#[test]
fn test_month_and_minute_are_distinct() {
    let month = SourceSpec::parse("binance-BTC/USDT-1M").unwrap();
    let minute = SourceSpec::parse("binance-BTC/USDT-1m").unwrap();
    assert_eq!(month.timeframe(), Timeframe::OneMonth);
    assert_eq!(minute.timeframe(), Timeframe::OneMinute);
    assert_ne!(month, minute);
}

#[test]
fn test_error_kinds() {
    assert!(matches!(
        SourceSpec::parse("bitmex-BTC/USD-2m"),
        Err(IdentifierError::InvalidTimeframe(_))
    ));
    assert!(matches!(
        SourceSpec::parse("bitmex_BTC/USD_1m"),
        Err(IdentifierError::InvalidFormat(_))
    ));
}

#[test]
fn test_registry_timeframe_support() {
    let registry = ExchangeRegistry::load().unwrap();
    let bitmex = registry.get("BitMEX").unwrap();
    assert!(bitmex.supports(Timeframe::OneMinute));
    assert!(!bitmex.supports(Timeframe::FifteenMinutes));

    let binance = registry.get("binance").unwrap();
    assert!(binance.supports(Timeframe::FifteenMinutes));
    assert!(binance.max_page_size() >= 750);
}
