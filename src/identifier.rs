//! Source key parsing and validation
//!
//! A source is one exchange + trading pair + timeframe combination, written as a
//! compact key: `exchange-BASE/QUOTE-timeframe` (e.g. `bitmex-BTC/USD-1m`).

use crate::Timeframe;
use std::fmt;
use std::str::FromStr;

/// One (exchange, symbol, timeframe) combination to sync
///
/// The exchange name is normalized to lowercase and the symbol to uppercase.
///
/// # Examples
///
/// ```
/// use ohlcv_sync::identifier::SourceSpec;
/// use ohlcv_sync::Timeframe;
///
/// let spec = SourceSpec::parse("BitMEX-btc/usd-1m").unwrap();
/// assert_eq!(spec.source(), "bitmex");
/// assert_eq!(spec.symbol(), "BTC/USD");
/// assert_eq!(spec.timeframe(), Timeframe::OneMinute);
/// assert_eq!(spec.to_string(), "bitmex-BTC/USD-1m");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpec {
    source: String,
    symbol: String,
    timeframe: Timeframe,
}

impl SourceSpec {
    /// Build a spec from already-separated parts
    pub fn new(source: impl AsRef<str>, symbol: impl AsRef<str>, timeframe: Timeframe) -> Self {
        Self {
            source: source.as_ref().trim().to_lowercase(),
            symbol: symbol.as_ref().trim().to_uppercase(),
            timeframe,
        }
    }

    /// Parse a `exchange-symbol-timeframe` key
    ///
    /// The exchange is everything before the first `-` and the timeframe everything
    /// after the last `-`, so symbols containing dashes are preserved.
    ///
    /// # Errors
    ///
    /// Returns an error if a component is missing, the symbol is not `BASE/QUOTE`
    /// or the timeframe is unknown.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let s = s.trim();
        let (source, rest) = s.split_once('-').ok_or_else(|| {
            IdentifierError::InvalidFormat(format!(
                "invalid source key '{s}': expected exchange-SYMBOL-timeframe"
            ))
        })?;
        let (symbol, timeframe) = rest.rsplit_once('-').ok_or_else(|| {
            IdentifierError::InvalidFormat(format!(
                "invalid source key '{s}': expected exchange-SYMBOL-timeframe"
            ))
        })?;

        Self::from_parts(source, symbol, timeframe)
    }

    /// Build a spec from CLI-style string parts, validating each one
    pub fn from_parts(source: &str, symbol: &str, timeframe: &str) -> Result<Self, IdentifierError> {
        if source.trim().is_empty() {
            return Err(IdentifierError::InvalidFormat(
                "exchange component cannot be empty".to_string(),
            ));
        }

        validate_symbol(symbol)?;

        let timeframe = Timeframe::from_str(timeframe.trim())
            .map_err(IdentifierError::InvalidTimeframe)?;

        Ok(Self::new(source, symbol, timeframe))
    }

    /// Exchange name (lowercase)
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Unified trading pair (uppercase, `BASE/QUOTE`)
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Candle timeframe
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Base asset of the pair
    pub fn base(&self) -> &str {
        self.symbol.split('/').next().unwrap_or(&self.symbol)
    }

    /// Quote asset of the pair
    pub fn quote(&self) -> &str {
        self.symbol.split('/').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.source, self.symbol, self.timeframe)
    }
}

impl FromStr for SourceSpec {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate_symbol(symbol: &str) -> Result<(), IdentifierError> {
    let symbol = symbol.trim();
    let (base, quote) = symbol.split_once('/').ok_or_else(|| {
        IdentifierError::InvalidFormat(format!(
            "invalid symbol '{symbol}': expected BASE/QUOTE"
        ))
    })?;

    if base.trim().is_empty() {
        return Err(IdentifierError::InvalidFormat(
            "base component cannot be empty".to_string(),
        ));
    }
    if quote.trim().is_empty() {
        return Err(IdentifierError::InvalidFormat(
            "quote component cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Errors that can occur during source key parsing
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    /// Invalid key format
    #[error("source key error: {0}")]
    InvalidFormat(String),

    /// Unknown timeframe
    #[error("source key error: {0}")]
    InvalidTimeframe(String),
}
