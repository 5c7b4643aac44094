//! Export encoder
//!
//! Serializes a session snapshot into the JSON dump the dashboard offers for
//! download, and parses such dumps back. The dump shape is:
//!
//! ```text
//! {
//!   "timestamp": "2024-01-15T14:00:00.000Z",
//!   "currentMood": { "score", "label", "color", "confidence" },
//!   "metrics": { "scrollSpeed", "pauseDuration", "tabSwitches", "readingRhythm", "timestamp" },
//!   "events": [ { "type", "value", "timestamp", "domain" } ],
//!   "siteData": [ [ "domain", { "domain", "moodAverage", "eventCount", "timeSpent", "engagementScore" } ] ]
//! }
//! ```

use crate::error::SessionError;
use crate::types::{BehaviorEvent, ExportPayload, Metrics, MoodState, SiteData};
use chrono::{DateTime, SecondsFormat, Utc};

/// Builds export payloads from owned snapshots
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportEncoder;

impl ExportEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Assemble a payload stamped at `exported_at`
    pub fn encode(
        &self,
        exported_at: DateTime<Utc>,
        current_mood: &MoodState,
        metrics: &Metrics,
        events: Vec<BehaviorEvent>,
        sites: Vec<SiteData>,
    ) -> ExportPayload {
        let site_data = sites
            .into_iter()
            .map(|site| (site.domain.clone(), site))
            .collect();

        ExportPayload {
            timestamp: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            current_mood: current_mood.clone(),
            metrics: *metrics,
            events,
            site_data,
        }
    }

    /// Pretty-printed JSON, two-space indented
    pub fn to_json(&self, payload: &ExportPayload) -> Result<String, SessionError> {
        serde_json::to_string_pretty(payload).map_err(SessionError::JsonError)
    }
}

/// Parse an export dump back into a payload
pub fn parse_export(json: &str) -> Result<ExportPayload, SessionError> {
    let payload: ExportPayload = serde_json::from_str(json)
        .map_err(|e| SessionError::ParseError(format!("Failed to parse export dump: {}", e)))?;

    DateTime::parse_from_rfc3339(&payload.timestamp).map_err(|e| {
        SessionError::ParseError(format!("Invalid export timestamp {:?}: {}", payload.timestamp, e))
    })?;

    Ok(payload)
}
