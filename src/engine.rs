//! Session state
//!
//! [`MoodEngine`] owns the five components of a session (accumulator, event
//! log, site aggregator, estimator, current mood) and applies inputs to them
//! synchronously. It has no timers of its own: the async
//! [`Session`](crate::session::Session) drives it from an inbox and two
//! clocks, and the C ABI drives it from whatever loop the host runs.

use crate::analytics::behavior_impact;
use crate::config::EngineConfig;
use crate::encoder::ExportEncoder;
use crate::error::SessionError;
use crate::estimator::MoodEstimator;
use crate::event_log::EventLog;
use crate::metrics::MetricsAccumulator;
use crate::sites::SiteAggregator;
use crate::types::{
    truncate_to_millis, BehaviorEvent, BehaviorEventType, BehaviorImpact, ExportPayload, Metrics,
    MoodState, SiteData, SiteEntry, SiteInfluence, TimelinePoint,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, trace};

/// Low-level interaction signal from the host page
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// Vertical scroll offset sample; `None` when the position could not be read
    Scroll {
        offset: Option<f64>,
        at: DateTime<Utc>,
    },
    /// A debounce window passed with no pointer or key activity
    IdleWindow { at: DateTime<Utc> },
    /// Page visibility transition
    Visibility { hidden: bool, at: DateTime<Utc> },
}

/// All mutable state of one visitor session
#[derive(Debug, Clone)]
pub struct MoodEngine {
    config: EngineConfig,
    accumulator: MetricsAccumulator,
    log: EventLog,
    sites: SiteAggregator,
    estimator: MoodEstimator,
    encoder: ExportEncoder,
    current_mood: MoodState,
    ticks: u64,
}

impl MoodEngine {
    /// Engine starting now
    pub fn new(config: EngineConfig) -> Result<Self, SessionError> {
        Self::starting_at(config, Utc::now())
    }

    /// Engine whose scroll baseline and metrics are stamped at `started_at`
    pub fn starting_at(config: EngineConfig, started_at: DateTime<Utc>) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            accumulator: MetricsAccumulator::new(&config, started_at),
            log: EventLog::new(config.log_capacity),
            sites: SiteAggregator::new(config.site_capacity),
            estimator: MoodEstimator::new(config.confidence_policy),
            encoder: ExportEncoder::new(),
            current_mood: MoodState::default(),
            ticks: 0,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fold a raw signal into the metrics
    pub fn apply_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Scroll { offset, at } => {
                self.accumulator.on_scroll(offset, at);
            }
            Signal::IdleWindow { at } => self.accumulator.on_idle_window(at),
            Signal::Visibility { hidden, at } => self.accumulator.on_visibility(hidden, at),
        }
    }

    /// Record a discrete behavior event observed at `at`.
    ///
    /// The event goes to the log, the site table is updated with the mood
    /// score current at this call, and tab switches are counted in the
    /// metrics, stamped with `at` rather than the event's own time. An event
    /// whose value is not a finite number is a failed read and is dropped.
    /// The mood itself is only recomputed on the next tick.
    pub fn track_event(&mut self, mut event: BehaviorEvent, at: DateTime<Utc>) {
        if !event.value.is_finite() {
            debug!(
                event_type = event.event_type.as_str(),
                domain = %event.domain,
                "event value unavailable, dropping event"
            );
            return;
        }
        event.timestamp = truncate_to_millis(event.timestamp);

        let score = self.current_mood.score;
        let site = self.sites.record(&event.domain, score, event.value);
        debug!(
            event_type = event.event_type.as_str(),
            domain = %event.domain,
            value = event.value,
            mood_average = site.mood_average,
            "event tracked"
        );

        if event.event_type == BehaviorEventType::TabSwitch {
            self.accumulator.record_tab_switch(at);
        }
        self.log.append(event);
    }

    /// Overwrite the metrics wholesale
    pub fn inject_metrics(&mut self, metrics: Metrics) {
        self.accumulator.replace(metrics);
    }

    /// Recompute the mood from the current metrics
    pub fn tick(&mut self) -> &MoodState {
        self.current_mood = self.estimator.estimate(self.accumulator.metrics());
        self.ticks += 1;
        trace!(
            tick = self.ticks,
            score = self.current_mood.score,
            label = self.current_mood.label.as_str(),
            confidence = self.current_mood.confidence,
            "mood estimated"
        );
        &self.current_mood
    }

    /// Reset log, site table and metrics. The current mood is kept until the
    /// next tick recomputes it.
    pub fn clear_data(&mut self, at: DateTime<Utc>) {
        self.log.clear();
        self.sites.clear();
        self.accumulator.reset(at);
        info!("session data cleared");
    }

    /// Snapshot of the whole session stamped at `exported_at`
    pub fn export_payload(&self, exported_at: DateTime<Utc>) -> ExportPayload {
        self.encoder.encode(
            exported_at,
            &self.current_mood,
            self.accumulator.metrics(),
            self.log.snapshot(),
            self.sites.entries(),
        )
    }

    /// Export dump as pretty JSON
    pub fn export_data(&self, exported_at: DateTime<Utc>) -> Result<String, SessionError> {
        let payload = self.export_payload(exported_at);
        self.encoder.to_json(&payload)
    }

    pub fn current_mood(&self) -> &MoodState {
        &self.current_mood
    }

    pub fn metrics(&self) -> &Metrics {
        self.accumulator.metrics()
    }

    /// Owned copy of the event log
    pub fn events(&self) -> Vec<BehaviorEvent> {
        self.log.snapshot()
    }

    /// Site records in first-seen order
    pub fn site_data(&self) -> Vec<SiteData> {
        self.sites.entries()
    }

    /// Domains ranked by mood average, highest first
    pub fn site_influence(&self) -> Vec<SiteInfluence> {
        self.sites.ranked()
    }

    /// Classified site rows, at most `limit`
    pub fn site_entries(&self, limit: usize) -> Vec<SiteEntry> {
        self.sites.classified(limit)
    }

    pub fn timeline(&self) -> Vec<TimelinePoint> {
        self.log.timeline()
    }

    pub fn behavior_impact(&self) -> BehaviorImpact {
        behavior_impact(self.accumulator.metrics())
    }

    /// Number of estimation ticks so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
