//! Core types for the moodtrace engine
//!
//! These are the records that flow between the accumulator, the estimator,
//! the event log and the site aggregator, and the shapes handed to readers.
//! Field names serialize in camelCase because the export dump is consumed by
//! the dashboard's JavaScript side.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Drop sub-millisecond precision, the resolution timestamps are exported at
pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

/// Rolling interaction metrics, replaced wholesale on every update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// Most recent scroll velocity in pixels per second, clamped to the configured ceiling
    pub scroll_speed: f64,
    /// Accumulated idle windows, one pause step per quiet debounce window
    pub pause_duration: f64,
    /// Cumulative count of tab-switch transitions
    pub tab_switches: u32,
    /// Reserved, always zero
    pub reading_rhythm: f64,
    /// Time of the last mutation
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Metrics {
    /// Zeroed metrics stamped at `at`
    pub fn zero(at: DateTime<Utc>) -> Self {
        Self {
            scroll_speed: 0.0,
            pause_duration: 0.0,
            tab_switches: 0,
            reading_rhythm: 0.0,
            timestamp: at,
        }
    }

    /// True when every counter is back at its initial value
    pub fn is_zero(&self) -> bool {
        self.scroll_speed == 0.0
            && self.pause_duration == 0.0
            && self.tab_switches == 0
            && self.reading_rhythm == 0.0
    }
}

/// Categorical mood bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodLabel {
    Stressed,
    Calm,
    Neutral,
    Focused,
    Engaged,
}

impl MoodLabel {
    /// Bucket a clamped score. Lower bounds are inclusive.
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            MoodLabel::Stressed
        } else if score < 45.0 {
            MoodLabel::Calm
        } else if score < 55.0 {
            MoodLabel::Neutral
        } else if score < 75.0 {
            MoodLabel::Focused
        } else {
            MoodLabel::Engaged
        }
    }

    /// Display token for this label
    pub fn color(&self) -> &'static str {
        match self {
            MoodLabel::Stressed => "oklch(0.55 0.25 20)",
            MoodLabel::Calm => "oklch(0.65 0.22 160)",
            MoodLabel::Neutral => "oklch(0.70 0.10 0)",
            MoodLabel::Focused => "oklch(0.55 0.18 200)",
            MoodLabel::Engaged => "oklch(0.45 0.20 50)",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoodLabel::Stressed => "stressed",
            MoodLabel::Calm => "calm",
            MoodLabel::Neutral => "neutral",
            MoodLabel::Focused => "focused",
            MoodLabel::Engaged => "engaged",
        }
    }
}

/// Current mood estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodState {
    /// Score in [0, 100]
    pub score: f64,
    /// Bucket of `score`
    pub label: MoodLabel,
    /// Display token of `label`
    pub color: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl MoodState {
    /// Build a state whose label and color are derived from `score`.
    ///
    /// Score is clamped to [0, 100] and confidence to [0, 1] before bucketing.
    pub fn new(score: f64, confidence: f64) -> Self {
        let score = score.clamp(0.0, 100.0);
        let label = MoodLabel::from_score(score);
        Self {
            score,
            label,
            color: label.color().to_string(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

impl Default for MoodState {
    /// The mood shown before the first estimation tick
    fn default() -> Self {
        Self::new(50.0, 0.5)
    }
}

/// Kind of discrete behavior event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BehaviorEventType {
    Scroll,
    Pause,
    TabSwitch,
    Reading,
}

impl BehaviorEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorEventType::Scroll => "scroll",
            BehaviorEventType::Pause => "pause",
            BehaviorEventType::TabSwitch => "tab-switch",
            BehaviorEventType::Reading => "reading",
        }
    }
}

/// A discrete behavior event, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    /// Event kind
    #[serde(rename = "type")]
    pub event_type: BehaviorEventType,
    /// Magnitude; meaning depends on the kind
    pub value: f64,
    /// When the event happened
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Origin site
    pub domain: String,
}

impl BehaviorEvent {
    pub fn new(
        event_type: BehaviorEventType,
        value: f64,
        domain: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            value,
            timestamp: truncate_to_millis(timestamp),
            domain: domain.into(),
        }
    }

    /// Event stamped with the current wall-clock time
    pub fn now(event_type: BehaviorEventType, value: f64, domain: impl Into<String>) -> Self {
        Self::new(event_type, value, domain, Utc::now())
    }
}

/// Running statistics for one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteData {
    pub domain: String,
    /// Running average of the global mood score at each event (alpha = 0.5)
    pub mood_average: f64,
    pub event_count: u32,
    /// Reserved, always zero
    pub time_spent: f64,
    /// Blend of mood average and last event magnitude
    pub engagement_score: f64,
}

impl SiteData {
    /// Fresh record seeded with the current global mood score
    pub fn seeded(domain: impl Into<String>, mood_score: f64) -> Self {
        Self {
            domain: domain.into(),
            mood_average: mood_score,
            event_count: 0,
            time_spent: 0.0,
            engagement_score: 0.0,
        }
    }
}

/// Ranked projection of a site record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteInfluence {
    pub domain: String,
    pub mood: f64,
}

/// Direction a site pulls the visitor's mood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfluenceClass {
    Positive,
    Neutral,
    Negative,
}

impl InfluenceClass {
    pub fn from_mood_average(mood_average: f64) -> Self {
        if mood_average > 65.0 {
            InfluenceClass::Positive
        } else if mood_average < 40.0 {
            InfluenceClass::Negative
        } else {
            InfluenceClass::Neutral
        }
    }
}

/// Row of the per-site comparison view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteEntry {
    pub domain: String,
    pub mood: f64,
    pub influence: InfluenceClass,
    pub time_spent: f64,
}

/// One minute of the mood timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// Minute bucket, `HH:MM` in UTC
    pub time: String,
    /// Rounded mean event value within the minute
    pub mood: f64,
    /// Kind of the first event seen in the minute
    pub label: BehaviorEventType,
}

/// How strongly each metric currently pushes the estimate, each in [0, 100]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorImpact {
    pub scroll_speed: f64,
    pub pause_duration: f64,
    pub tab_switching: f64,
}

/// Export dump handed to external consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    /// Export time, ISO-8601 with millisecond precision
    pub timestamp: String,
    pub current_mood: MoodState,
    pub metrics: Metrics,
    pub events: Vec<BehaviorEvent>,
    /// `[domain, record]` pairs in first-seen order
    pub site_data: Vec<(String, SiteData)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_event_type_serialization() {
        let json = serde_json::to_string(&BehaviorEventType::TabSwitch).unwrap();
        assert_eq!(json, "\"tab-switch\"");

        let parsed: BehaviorEventType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, BehaviorEventType::TabSwitch);
    }

    #[test]
    fn test_event_wire_shape() {
        let event = BehaviorEvent::new(
            BehaviorEventType::Scroll,
            42.0,
            "example.com",
            Utc.timestamp_millis_opt(1_705_327_200_123).unwrap(),
        );
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "scroll");
        assert_eq!(value["value"], 42.0);
        assert_eq!(value["timestamp"], 1_705_327_200_123i64);
        assert_eq!(value["domain"], "example.com");
    }

    #[test]
    fn test_event_time_kept_at_millisecond_precision() {
        let at = Utc.timestamp_millis_opt(1_705_327_200_001).unwrap()
            + chrono::Duration::nanoseconds(234_567);
        let event = BehaviorEvent::new(BehaviorEventType::Pause, 1.0, "example.com", at);
        assert_eq!(event.timestamp.timestamp_subsec_nanos(), 1_000_000);

        let json = serde_json::to_string(&event).unwrap();
        let parsed: BehaviorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_metrics_camel_case() {
        let metrics = Metrics::zero(Utc.timestamp_millis_opt(1_000).unwrap());
        let value = serde_json::to_value(&metrics).unwrap();

        assert!(value["scrollSpeed"].is_number());
        assert!(value["pauseDuration"].is_number());
        assert_eq!(value["tabSwitches"], 0);
        assert!(value["readingRhythm"].is_number());
        assert_eq!(value["timestamp"], 1_000);
    }

    #[test]
    fn test_mood_state_is_consistent() {
        let mood = MoodState::new(120.0, 1.4);
        assert_eq!(mood.score, 100.0);
        assert_eq!(mood.label, MoodLabel::Engaged);
        assert_eq!(mood.color, MoodLabel::Engaged.color());
        assert_eq!(mood.confidence, 1.0);

        let initial = MoodState::default();
        assert_eq!(initial.label, MoodLabel::Neutral);
        assert_eq!(initial.confidence, 0.5);
    }

    #[test]
    fn test_influence_thresholds() {
        assert_eq!(InfluenceClass::from_mood_average(65.1), InfluenceClass::Positive);
        assert_eq!(InfluenceClass::from_mood_average(65.0), InfluenceClass::Neutral);
        assert_eq!(InfluenceClass::from_mood_average(40.0), InfluenceClass::Neutral);
        assert_eq!(InfluenceClass::from_mood_average(39.9), InfluenceClass::Negative);
    }
}
