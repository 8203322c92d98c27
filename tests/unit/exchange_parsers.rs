//! Exchange payload parsing against captured response shapes

use ohlcv_sync::fetcher::binance::BinanceSpot;
use ohlcv_sync::fetcher::bitmex::Bitmex;
use ohlcv_sync::{CandleField, RawCandle, SourceSpec, Timeframe};
use serde_json::json;

/// Wall clock for parsing: after every captured kline closed
const NOW: i64 = 1_700_000_000_000;

#[test]
fn test_binance_klines_page() {
    let body = json!([
        [
            1699920000000i64, "35000.50", "35100.00", "34950.00", "35050.75", "1234.567",
            1699920059999i64, "43210987.65", 5432, "617.283", "21605493.82", "0"
        ],
        [
            1699920060000i64, "35050.75", "35080.00", "35010.10", "35020.00", "98.1",
            1699920119999i64, "3436000.00", 812, "40.0", "1400000.00", "0"
        ]
    ]);
    let klines = body.as_array().unwrap().clone();

    let candles = BinanceSpot::parse_klines(klines, NOW);
    assert_eq!(candles.len(), 2);

    let source = SourceSpec::new("binance", "BTC/USDT", Timeframe::OneMinute);
    let first = candles[0].clone().into_record(&source).unwrap();
    assert_eq!(first.timestamp, 1699920000000);
    assert_eq!(first.open, 35000.50);
    assert_eq!(first.high, 35100.00);
    assert_eq!(first.low, 34950.00);
    assert_eq!(first.close, 35050.75);
    assert_eq!(first.volume, 1234.567);
    assert_eq!(candles[1].timestamp(), Some(1699920060000));
}

#[test]
fn test_binance_kline_with_garbage_value_is_incomplete() {
    let klines = vec![json!([1699920000000i64, "35000.50", "n/a", "34950.00", "35050.75", "1.0"])];
    let candles = BinanceSpot::parse_klines(klines, NOW);

    match &candles[0] {
        RawCandle::Incomplete { timestamp, missing } => {
            assert_eq!(*timestamp, Some(1699920000000));
            assert_eq!(missing, &vec![CandleField::High]);
        }
        other => panic!("expected incomplete candle, got {other:?}"),
    }
}

#[test]
fn test_binance_kline_closing_in_the_future_is_incomplete() {
    let open_time = NOW - 20_000;
    let body = json!([
        [
            NOW - 80_000, "35000.50", "35100.00", "34950.00", "35050.75", "1234.567",
            NOW - 20_001, "43210987.65", 5432, "617.283", "21605493.82", "0"
        ],
        [
            open_time, "35050.75", "35080.00", "35010.10", "35020.00", "98.1",
            open_time + 59_999, "3436000.00", 812, "40.0", "1400000.00", "0"
        ]
    ]);
    let candles = BinanceSpot::parse_klines(body.as_array().unwrap().clone(), NOW);

    let source = SourceSpec::new("binance", "BTC/USDT", Timeframe::OneMinute);
    assert!(candles[0].clone().into_record(&source).is_ok());

    // Forming candle keeps its timestamp but is never turned into a record
    assert_eq!(candles[1].timestamp(), Some(open_time));
    match &candles[1] {
        RawCandle::Incomplete { missing, .. } => assert_eq!(missing, &vec![CandleField::Close]),
        other => panic!("expected incomplete candle, got {other:?}"),
    }
    assert!(candles[1].clone().into_record(&source).is_err());
}

#[test]
fn test_binance_symbol_listing_skips_halted_pairs() {
    let body = json!({
        "timezone": "UTC",
        "symbols": [
            {"symbol": "ETHBTC", "status": "TRADING", "baseAsset": "ETH", "quoteAsset": "BTC"},
            {"symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT"},
            {"symbol": "LUNAUSDT", "status": "BREAK", "baseAsset": "LUNA", "quoteAsset": "USDT"}
        ]
    });

    let symbols = BinanceSpot::parse_exchange_info(&body).unwrap();
    assert_eq!(symbols, vec!["BTC/USDT", "ETH/BTC"]);
}

#[test]
fn test_bitmex_bucketed_page_with_empty_bucket() {
    let buckets = vec![
        json!({
            "timestamp": "2023-11-14T22:14:00.000Z",
            "symbol": "XBTUSD",
            "open": 36480.5,
            "high": 36501,
            "low": 36470,
            "close": 36490.5,
            "trades": 112,
            "volume": 2301400,
            "vwap": 36488.1
        }),
        json!({
            "timestamp": "2023-11-14T22:15:00.000Z",
            "symbol": "XBTUSD",
            "open": null,
            "high": null,
            "low": null,
            "close": null,
            "trades": 0,
            "volume": 0,
            "vwap": null
        }),
    ];

    let candles = Bitmex::parse_buckets(buckets);
    assert_eq!(candles.len(), 2);

    let source = SourceSpec::new("bitmex", "BTC/USD", Timeframe::OneMinute);
    let record = candles[0].clone().into_record(&source).unwrap();
    assert_eq!(record.timestamp, 1_700_000_040_000);
    assert_eq!(record.high, 36501.0);
    assert_eq!(record.volume, 2301400.0);

    // Empty bucket still carries its timestamp for cursor progress
    assert_eq!(candles[1].timestamp(), Some(1_700_000_100_000));
    assert!(candles[1].clone().into_record(&source).is_err());
}

#[test]
fn test_bitmex_symbol_mapping() {
    assert_eq!(Bitmex::native_symbol("BTC/USD"), "XBTUSD");
    assert_eq!(Bitmex::native_symbol("ETH/USD"), "ETHUSD");
    assert_eq!(BinanceSpot::native_symbol("eth/usdt"), "ETHUSDT");

    let instruments = vec![
        json!({"symbol": "XBTUSD", "typ": "FFWCSX", "underlying": "XBT", "quoteCurrency": "USD"}),
        json!({"symbol": "ETHUSD", "typ": "FFWCSX", "underlying": "ETH", "quoteCurrency": "USD"}),
        json!({"symbol": "XBTZ23", "typ": "FFCCSX", "underlying": "XBT", "quoteCurrency": "USD"}),
    ];
    assert_eq!(Bitmex::parse_instruments(&instruments), vec!["BTC/USD", "ETH/USD"]);
}

/// Every listed BitMEX symbol forms a source key that syncs the same instrument
#[test]
fn test_bitmex_listed_symbols_are_syncable() {
    let instruments = vec![
        json!({"symbol": "XBTUSD", "typ": "FFWCSX", "underlying": "XBT", "quoteCurrency": "USD"}),
        json!({"symbol": "XBTUSDT", "typ": "FFWCSX", "underlying": "XBT", "quoteCurrency": "USDT"}),
        json!({"symbol": "XBTZ23", "typ": "FFCCSX", "underlying": "XBT", "quoteCurrency": "USD"}),
        json!({"symbol": "ETHH24", "typ": "FFCCSX", "underlying": "ETH", "quoteCurrency": "USD"}),
    ];
    let natives: Vec<&str> = instruments
        .iter()
        .filter_map(|inst| inst["symbol"].as_str())
        .collect();

    let symbols = Bitmex::parse_instruments(&instruments);
    assert_eq!(symbols, vec!["BTC/USD", "BTC/USDT"]);
    for symbol in symbols {
        let spec = SourceSpec::parse(&format!("bitmex-{symbol}-1m")).unwrap();
        assert!(natives.contains(&Bitmex::native_symbol(spec.symbol()).as_str()));
    }
}
