//! Cooperative request throttling
//!
//! Exchanges publish a minimum interval between requests; the pagination loop
//! pauses for that interval after every page. The pause ends early when a
//! shutdown is requested so Ctrl+C never waits out a long interval.

use crate::shutdown::SharedShutdown;
use std::time::Duration;
use tokio::time::sleep;

/// How a pause ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    /// The full interval elapsed
    Elapsed,
    /// Shutdown was requested during the pause
    Interrupted,
}

/// Fixed-interval throttle for one exchange
#[derive(Debug, Clone)]
pub struct RequestThrottle {
    interval: Duration,
}

impl RequestThrottle {
    /// Create a throttle with the exchange's minimum request interval
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Wait out the interval, or until shutdown is requested
    pub async fn pause(&self, shutdown: Option<&SharedShutdown>) -> PauseOutcome {
        match shutdown {
            Some(shutdown) => {
                if shutdown.is_shutdown_requested() {
                    return PauseOutcome::Interrupted;
                }
                tokio::select! {
                    _ = sleep(self.interval) => PauseOutcome::Elapsed,
                    _ = shutdown.wait_for_shutdown() => PauseOutcome::Interrupted,
                }
            }
            None => {
                sleep(self.interval).await;
                PauseOutcome::Elapsed
            }
        }
    }
}
