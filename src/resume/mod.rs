//! Resume-point resolution
//!
//! No checkpoint is kept outside the store: where a sync continues is derived
//! from the newest point already written for the source.

pub mod resolver;

pub use resolver::{resolve_last, resolve_start, MissingStartPolicy, ResumePoint, StartMode};

use crate::store::StoreError;

/// Resume resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The store query failed
    #[error("failed to query last point for {source_key}: {error}")]
    Query {
        /// Source key (`exchange-symbol-timeframe`)
        source_key: String,
        /// Underlying store error
        #[source]
        error: StoreError,
    },

    /// The store has no data for the source and no fallback was configured
    #[error("can not fetch OHLCV data for {source_key} without a starting time (store has no data; pass --origin, --year, --since or --from-epoch-if-empty)")]
    NoStartingPoint {
        /// Source key (`exchange-symbol-timeframe`)
        source_key: String,
    },
}
