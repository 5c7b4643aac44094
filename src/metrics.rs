//! Metrics accumulation
//!
//! Folds low-level interaction signals (scroll offsets, idle windows,
//! visibility transitions, tab-switch pulses) into the single rolling
//! [`Metrics`] record the estimator samples. Every update writes a whole new
//! record; nothing is merged from a stale copy.

use crate::config::EngineConfig;
use crate::types::{truncate_to_millis, Metrics};
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

/// Accumulator for the rolling interaction metrics
#[derive(Debug, Clone)]
pub struct MetricsAccumulator {
    metrics: Metrics,
    /// Offset of the last accepted scroll sample
    last_scroll_offset: f64,
    /// Time base for the next speed computation
    last_scroll_at: DateTime<Utc>,
    /// False while the page is hidden
    visible: bool,
    max_scroll_speed: f64,
    pause_step: f64,
}

impl MetricsAccumulator {
    /// Create an accumulator whose scroll baseline is offset 0 at `started_at`
    pub fn new(config: &EngineConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            metrics: Metrics::zero(truncate_to_millis(started_at)),
            last_scroll_offset: 0.0,
            last_scroll_at: started_at,
            visible: true,
            max_scroll_speed: config.max_scroll_speed,
            pause_step: config.pause_step,
        }
    }

    /// Current metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Whether the page is currently visible
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Fold a scroll sample into the scroll speed.
    ///
    /// An unavailable or non-finite offset is a failed sensor read and leaves
    /// the metrics untouched, as does any sample taken while the page is
    /// hidden. Returns whether the metrics changed.
    pub fn on_scroll(&mut self, offset: Option<f64>, at: DateTime<Utc>) -> bool {
        let Some(offset) = offset.filter(|o| o.is_finite()) else {
            debug!("scroll offset unavailable, keeping last metrics");
            return false;
        };
        if !self.visible {
            trace!(offset, "scroll sample while hidden ignored");
            return false;
        }

        let elapsed_sec = (at - self.last_scroll_at).num_milliseconds() as f64 / 1000.0;
        let distance = (offset - self.last_scroll_offset).abs();
        let speed = scroll_speed(distance, elapsed_sec, self.max_scroll_speed);

        self.last_scroll_offset = offset;
        self.last_scroll_at = at;

        self.metrics = Metrics {
            scroll_speed: speed,
            timestamp: self.stamp(at),
            ..self.metrics
        };
        trace!(speed, "scroll speed updated");
        true
    }

    /// One uninterrupted debounce window elapsed without pointer or key activity
    pub fn on_idle_window(&mut self, at: DateTime<Utc>) {
        self.metrics = Metrics {
            pause_duration: self.metrics.pause_duration + self.pause_step,
            timestamp: self.stamp(at),
            ..self.metrics
        };
        trace!(pause = self.metrics.pause_duration, "idle window recorded");
    }

    /// Page visibility transition.
    ///
    /// Becoming visible moves the scroll time base to `at` so the background
    /// interval does not show up as a single slow, or spuriously fast, sample.
    pub fn on_visibility(&mut self, hidden: bool, at: DateTime<Utc>) {
        if hidden {
            self.visible = false;
        } else {
            self.visible = true;
            self.last_scroll_at = at;
        }
        debug!(hidden, "visibility changed");
    }

    /// Count one tab switch
    pub fn record_tab_switch(&mut self, at: DateTime<Utc>) {
        self.metrics = Metrics {
            tab_switches: self.metrics.tab_switches.saturating_add(1),
            timestamp: self.stamp(at),
            ..self.metrics
        };
    }

    /// Reset every metric to zero. The scroll baseline is kept.
    pub fn reset(&mut self, at: DateTime<Utc>) {
        self.metrics = Metrics::zero(self.stamp(at));
    }

    /// Overwrite the metrics wholesale, used by hosts that measure elsewhere.
    ///
    /// Negative or non-finite readings become zero and the scroll speed is
    /// clamped to the ceiling. `reading_rhythm` stays reserved at zero.
    pub fn replace(&mut self, metrics: Metrics) {
        self.metrics = Metrics {
            scroll_speed: non_negative(metrics.scroll_speed).min(self.max_scroll_speed),
            pause_duration: non_negative(metrics.pause_duration),
            tab_switches: metrics.tab_switches,
            reading_rhythm: 0.0,
            timestamp: self.stamp(metrics.timestamp),
        };
    }

    /// Timestamp for the next record at millisecond precision, never earlier
    /// than the current one
    fn stamp(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        truncate_to_millis(at).max(self.metrics.timestamp)
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Speed in pixels per second, zero when no time elapsed
fn scroll_speed(distance: f64, elapsed_sec: f64, max_speed: f64) -> f64 {
    if elapsed_sec <= 0.0 {
        return 0.0;
    }
    (distance / elapsed_sec).clamp(0.0, max_speed)
}
