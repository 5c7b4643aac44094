//! Behavior impact read model
//!
//! Scales each raw metric onto a common 0-100 range so a reader can compare
//! how strongly scrolling, pausing and tab switching currently weigh in.

use crate::types::{BehaviorImpact, Metrics};

const MAX_IMPACT: f64 = 100.0;

/// Impact of the current metrics.
///
/// `scroll = speed / 10`, `pause = pause_duration / 100`, `tabs = switches * 10`,
/// each capped at 100.
pub fn behavior_impact(metrics: &Metrics) -> BehaviorImpact {
    BehaviorImpact {
        scroll_speed: (metrics.scroll_speed / 10.0).min(MAX_IMPACT),
        pause_duration: (metrics.pause_duration / 100.0).min(MAX_IMPACT),
        tab_switching: (f64::from(metrics.tab_switches) * 10.0).min(MAX_IMPACT),
    }
}
