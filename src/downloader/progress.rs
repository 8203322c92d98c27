//! Progress tracking for long-running syncs.
//!
//! A sync from an old resume point can take hours (a 2 s BitMEX interval and 750
//! candles per page). The pagination loop feeds each page into a
//! [`ProgressState`], which decides when to emit a progress log line based on how
//! far the cursor has moved through the `[since, now)` timeline.

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{Duration, Instant};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const MIN_SYNC_DURATION: Duration = Duration::from_secs(30);

/// Controls update cadence.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    update_interval: Duration,
    min_percentage_step: f64,
}

impl ProgressTracker {
    /// Create a tracker with custom interval and percentage step.
    pub fn new(update_interval: Duration, min_percentage_step: f64) -> Self {
        Self {
            update_interval,
            min_percentage_step,
        }
    }

    /// Build a [`ProgressState`] for a `[start, end)` timeline.
    pub fn create_state(&self, start: i64, end: i64) -> ProgressState {
        let now = Instant::now();
        ProgressState {
            candles_written: 0,
            pages: 0,
            started: now,
            last_update: now,
            update_interval: self.update_interval,
            last_reported_percentage: 0.0,
            min_percentage_step: self.min_percentage_step,
            range: (start, end),
            position: start,
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_UPDATE_INTERVAL, 10.0)
    }
}

/// Progress of one job through its time range.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Candles handed to the store so far.
    pub candles_written: u64,
    /// Pages fetched so far.
    pub pages: u64,
    started: Instant,
    last_update: Instant,
    update_interval: Duration,
    last_reported_percentage: f64,
    min_percentage_step: f64,
    range: (i64, i64),
    position: i64,
}

impl ProgressState {
    /// Record a processed page.
    pub fn update(&mut self, new_candles: u64, position: i64) {
        self.pages += 1;
        self.candles_written = self.candles_written.saturating_add(new_candles);
        self.position = self.position.max(position);
    }

    /// Whether a progress line is due, by percentage jump or elapsed time.
    pub fn should_emit_update(&self) -> bool {
        if self.pages == 0 {
            return false;
        }

        let percentage_jump =
            self.percentage() - self.last_reported_percentage >= self.min_percentage_step;
        if percentage_jump {
            return true;
        }

        self.started.elapsed() >= MIN_SYNC_DURATION
            && self.last_update.elapsed() >= self.update_interval
    }

    /// Reset timers and cached percentage after emitting a line.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        self.last_reported_percentage = self.percentage();
    }

    /// Completed share of the timeline (0-100).
    pub fn percentage(&self) -> f64 {
        let (start, end) = self.range;
        let span = (end - start) as f64;
        if span <= 0.0 {
            return 100.0;
        }
        let completed = (self.position.clamp(start, end) - start) as f64;
        (completed / span * 100.0).clamp(0.0, 100.0)
    }

    /// Estimated time left, extrapolated from timeline progress.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let ratio = self.percentage() / 100.0;
        if !(ratio > 0.0 && ratio < 1.0) {
            return None;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let remaining = (elapsed / ratio - elapsed).max(0.0);
        Some(Duration::from_secs_f64(remaining))
    }

    /// Human-readable progress line.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![
            format!("[PROGRESS] Synced {} candles", self.candles_written),
            format!("- {:.1}% complete", self.percentage()),
        ];

        if let Some(position) = DateTime::<Utc>::from_timestamp_millis(self.position) {
            parts.push(format!(
                "(up to {})",
                position.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
