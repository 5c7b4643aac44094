//! Mood estimation
//!
//! A pure function from a metrics snapshot to a [`MoodState`], sampled on a
//! fixed cadence by the session. This is the only place a mood is computed.
//!
//! Rules, applied in order to a neutral baseline of 50 with confidence 0.3:
//!
//! ```text
//! scroll_speed   > 500  -> +15, confidence 0.7
//! scroll_speed   > 200  -> + 5, confidence 0.5
//! pause_duration > 5000 -> -10, confidence 0.6
//! pause_duration > 2000 -> +10, confidence 0.6
//! tab_switches   > 5    -> -20, confidence 0.8
//! ```
//!
//! How the confidences of several firing rules combine is a
//! [`ConfidencePolicy`].

use crate::config::ConfidencePolicy;
use crate::types::{Metrics, MoodState};

/// Neutral starting score
const BASELINE_SCORE: f64 = 50.0;

/// Confidence when no rule fires
const BASELINE_CONFIDENCE: f64 = 0.3;

const FAST_SCROLL: f64 = 500.0;
const MODERATE_SCROLL: f64 = 200.0;
const LONG_PAUSE: f64 = 5_000.0;
const MODERATE_PAUSE: f64 = 2_000.0;
const FREQUENT_TAB_SWITCHES: u32 = 5;

/// Scores metrics snapshots
#[derive(Debug, Clone, Copy, Default)]
pub struct MoodEstimator {
    policy: ConfidencePolicy,
}

impl MoodEstimator {
    pub fn new(policy: ConfidencePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ConfidencePolicy {
        self.policy
    }

    /// Estimate the mood for `metrics`
    pub fn estimate(&self, metrics: &Metrics) -> MoodState {
        let mut score = BASELINE_SCORE;
        let mut confidence = BASELINE_CONFIDENCE;

        // Fast scrolling reads as engagement
        if metrics.scroll_speed > FAST_SCROLL {
            score += 15.0;
            confidence = self.combine(confidence, 0.7);
        } else if metrics.scroll_speed > MODERATE_SCROLL {
            score += 5.0;
            confidence = self.combine(confidence, 0.5);
        }

        // Long idle stretches read as fatigue, moderate ones as focus
        if metrics.pause_duration > LONG_PAUSE {
            score -= 10.0;
            confidence = self.combine(confidence, 0.6);
        } else if metrics.pause_duration > MODERATE_PAUSE {
            score += 10.0;
            confidence = self.combine(confidence, 0.6);
        }

        if metrics.tab_switches > FREQUENT_TAB_SWITCHES {
            score -= 20.0;
            confidence = self.combine(confidence, 0.8);
        }

        MoodState::new(score, confidence)
    }

    fn combine(&self, current: f64, rule: f64) -> f64 {
        match self.policy {
            ConfidencePolicy::LastMatch => rule,
            ConfidencePolicy::Max => current.max(rule),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MoodLabel;
    use chrono::{TimeZone, Utc};

    fn metrics(scroll_speed: f64, pause_duration: f64, tab_switches: u32) -> Metrics {
        Metrics {
            scroll_speed,
            pause_duration,
            tab_switches,
            reading_rhythm: 0.0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap(),
        }
    }

    fn both() -> [MoodEstimator; 2] {
        [
            MoodEstimator::new(ConfidencePolicy::LastMatch),
            MoodEstimator::new(ConfidencePolicy::Max),
        ]
    }

    #[test]
    fn test_idle_metrics_are_neutral() {
        for estimator in both() {
            let mood = estimator.estimate(&metrics(0.0, 0.0, 0));
            assert_eq!(mood.score, 50.0);
            assert_eq!(mood.label, MoodLabel::Neutral);
            assert_eq!(mood.confidence, 0.3);
        }
    }

    #[test]
    fn test_fast_scroll_is_focused() {
        for estimator in both() {
            let mood = estimator.estimate(&metrics(600.0, 0.0, 0));
            assert_eq!(mood.score, 65.0);
            assert_eq!(mood.confidence, 0.7);
            assert_eq!(mood.label, MoodLabel::Focused);
            assert_eq!(mood.color, MoodLabel::Focused.color());
        }
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let estimator = MoodEstimator::default();
        assert_eq!(estimator.estimate(&metrics(500.0, 0.0, 0)).score, 55.0);
        assert_eq!(estimator.estimate(&metrics(200.0, 0.0, 0)).score, 50.0);
        assert_eq!(estimator.estimate(&metrics(0.0, 5_000.0, 0)).score, 60.0);
        assert_eq!(estimator.estimate(&metrics(0.0, 2_000.0, 0)).score, 50.0);
        assert_eq!(estimator.estimate(&metrics(0.0, 0.0, 5)).score, 50.0);
    }

    #[test]
    fn test_six_tab_switches_land_on_calm_boundary() {
        for estimator in both() {
            let mood = estimator.estimate(&metrics(0.0, 0.0, 6));
            assert_eq!(mood.score, 30.0);
            assert_eq!(mood.label, MoodLabel::Calm);
            assert_eq!(mood.confidence, 0.8);
        }
    }

    #[test]
    fn test_rules_accumulate() {
        let mood = MoodEstimator::default().estimate(&metrics(300.0, 6_000.0, 8));
        // 50 + 5 - 10 - 20
        assert_eq!(mood.score, 25.0);
        assert_eq!(mood.label, MoodLabel::Stressed);
    }

    #[test]
    fn test_last_match_overwrites_higher_confidence() {
        // Fast scroll (0.7) followed by a moderate pause (0.6)
        let input = metrics(600.0, 3_000.0, 0);

        let last = MoodEstimator::new(ConfidencePolicy::LastMatch).estimate(&input);
        assert_eq!(last.score, 75.0);
        assert_eq!(last.confidence, 0.6);

        let max = MoodEstimator::new(ConfidencePolicy::Max).estimate(&input);
        assert_eq!(max.score, 75.0);
        assert_eq!(max.confidence, 0.7);
    }

    #[test]
    fn test_label_boundaries_are_exact() {
        let cases = [
            (29.999, MoodLabel::Stressed),
            (30.0, MoodLabel::Calm),
            (44.999, MoodLabel::Calm),
            (45.0, MoodLabel::Neutral),
            (54.999, MoodLabel::Neutral),
            (55.0, MoodLabel::Focused),
            (74.999, MoodLabel::Focused),
            (75.0, MoodLabel::Engaged),
            (100.0, MoodLabel::Engaged),
            (0.0, MoodLabel::Stressed),
        ];
        for (score, expected) in cases {
            assert_eq!(MoodLabel::from_score(score), expected, "score {score}");
            assert_eq!(MoodState::new(score, 0.5).label, expected, "score {score}");
        }
    }
}
