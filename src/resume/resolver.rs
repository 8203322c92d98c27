//! Start-point selection for a sync job

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::ResolveError;
use crate::store::{LastPointQuery, TimeSeriesStore};
use crate::SourceSpec;

/// What to do when the store holds no data for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingStartPolicy {
    /// Fail the job with a "no starting point" error
    #[default]
    Abort,
    /// Start from the Unix epoch (full history)
    Epoch,
}

/// How a job chooses its first `since`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartMode {
    /// Caller-supplied start (Unix milliseconds); the store is not queried
    Explicit(i64),
    /// Start at epoch 0; the store is not queried
    FullHistory,
    /// Continue after the newest persisted point
    Resume {
        /// Fallback when the store is empty for the source
        on_missing: MissingStartPolicy,
    },
}

impl StartMode {
    /// Resume from the store, failing when there is nothing to resume from
    pub fn resume() -> Self {
        StartMode::Resume {
            on_missing: MissingStartPolicy::Abort,
        }
    }
}

impl Default for StartMode {
    fn default() -> Self {
        Self::resume()
    }
}

/// Resolved start of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    /// First `since` passed to the exchange (Unix milliseconds)
    pub since: i64,
    /// Newest timestamp already in the store, if the start came from it
    pub persisted_through: Option<i64>,
}

/// Newest `close` timestamp stored for the source, searching from `fallback_since`
///
/// # Errors
/// Returns [`ResolveError::Query`] when the store query fails.
pub async fn resolve_last(
    store: &dyn TimeSeriesStore,
    source: &SourceSpec,
    fallback_since: i64,
) -> Result<Option<i64>, ResolveError> {
    let query = LastPointQuery::for_source(source, fallback_since);
    let last = store
        .query_last(&query)
        .await
        .map_err(|error| ResolveError::Query {
            source_key: source.to_string(),
            error,
        })?;
    debug!(source = %source, last = ?last, "Queried last stored point");
    Ok(last)
}

/// Pick the job's first `since` according to the start mode
///
/// # Errors
/// Query failures, and an empty store under [`MissingStartPolicy::Abort`].
pub async fn resolve_start(
    store: &dyn TimeSeriesStore,
    source: &SourceSpec,
    mode: StartMode,
) -> Result<ResumePoint, ResolveError> {
    match mode {
        StartMode::Explicit(since) => Ok(ResumePoint {
            since,
            persisted_through: None,
        }),
        StartMode::FullHistory => Ok(ResumePoint {
            since: 0,
            persisted_through: None,
        }),
        StartMode::Resume { on_missing } => match resolve_last(store, source, 0).await? {
            Some(last) => {
                info!(source = %source, since = last, "Resuming from last stored candle");
                Ok(ResumePoint {
                    since: last,
                    persisted_through: Some(last),
                })
            }
            None => match on_missing {
                MissingStartPolicy::Epoch => {
                    info!(source = %source, "No stored candles, starting from epoch");
                    Ok(ResumePoint {
                        since: 0,
                        persisted_through: None,
                    })
                }
                MissingStartPolicy::Abort => Err(ResolveError::NoStartingPoint {
                    source_key: source.to_string(),
                }),
            },
        },
    }
}
