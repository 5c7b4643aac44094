//! Engine configuration
//!
//! Every tunable of the engine lives here. The defaults reproduce the
//! dashboard's fixed constants, so `EngineConfig::default()` is what a
//! browser session runs with.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mood re-estimation cadence (2 seconds)
pub const DEFAULT_TICK_MS: u64 = 2_000;

/// Quiet period that counts as one pause (100 ms)
pub const DEFAULT_IDLE_DEBOUNCE_MS: u64 = 100;

/// Amount added to `pause_duration` per quiet window
pub const DEFAULT_PAUSE_STEP: f64 = 100.0;

/// Number of events kept in the log
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Scroll speed ceiling in pixels per second
pub const DEFAULT_MAX_SCROLL_SPEED: f64 = 1_000.0;

/// Number of domains kept in the site table
pub const DEFAULT_SITE_CAPACITY: usize = 500;

/// How the estimator combines the confidence of several firing rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidencePolicy {
    /// Each firing rule overwrites the confidence; the last one wins
    #[default]
    LastMatch,
    /// Each firing rule raises the confidence to at least its own value
    Max,
}

/// Tunables for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Mood estimation period in milliseconds
    pub tick_ms: u64,
    /// Idle debounce window in milliseconds
    pub idle_debounce_ms: u64,
    /// Pause increment per quiet window
    pub pause_step: f64,
    /// Maximum number of events in the log
    pub log_capacity: usize,
    /// Scroll speed ceiling
    pub max_scroll_speed: f64,
    /// Maximum number of tracked domains
    pub site_capacity: usize,
    /// Confidence combination policy
    pub confidence_policy: ConfidencePolicy,
    /// Capacity of the session inbox
    pub inbox_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            idle_debounce_ms: DEFAULT_IDLE_DEBOUNCE_MS,
            pause_step: DEFAULT_PAUSE_STEP,
            log_capacity: DEFAULT_LOG_CAPACITY,
            max_scroll_speed: DEFAULT_MAX_SCROLL_SPEED,
            site_capacity: DEFAULT_SITE_CAPACITY,
            confidence_policy: ConfidencePolicy::default(),
            inbox_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Load a config from JSON; missing fields fall back to the defaults
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Same config with a different confidence policy
    pub fn with_confidence_policy(mut self, policy: ConfidencePolicy) -> Self {
        self.confidence_policy = policy;
        self
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.tick_ms == 0 {
            return Err(SessionError::InvalidConfig(
                "tick_ms must be positive".to_string(),
            ));
        }
        if self.idle_debounce_ms == 0 {
            return Err(SessionError::InvalidConfig(
                "idle_debounce_ms must be positive".to_string(),
            ));
        }
        if self.log_capacity == 0 {
            return Err(SessionError::InvalidConfig(
                "log_capacity must be positive".to_string(),
            ));
        }
        if self.site_capacity == 0 {
            return Err(SessionError::InvalidConfig(
                "site_capacity must be positive".to_string(),
            ));
        }
        if self.inbox_capacity == 0 {
            return Err(SessionError::InvalidConfig(
                "inbox_capacity must be positive".to_string(),
            ));
        }
        if !self.pause_step.is_finite() || self.pause_step < 0.0 {
            return Err(SessionError::InvalidConfig(format!(
                "pause_step must be a non-negative number, got {}",
                self.pause_step
            )));
        }
        if !self.max_scroll_speed.is_finite() || self.max_scroll_speed < 0.0 {
            return Err(SessionError::InvalidConfig(format!(
                "max_scroll_speed must be a non-negative number, got {}",
                self.max_scroll_speed
            )));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn idle_debounce(&self) -> Duration {
        Duration::from_millis(self.idle_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_dashboard_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_period(), Duration::from_secs(2));
        assert_eq!(config.idle_debounce(), Duration::from_millis(100));
        assert_eq!(config.pause_step, 100.0);
        assert_eq!(config.log_capacity, 100);
        assert_eq!(config.max_scroll_speed, 1_000.0);
        assert_eq!(config.confidence_policy, ConfidencePolicy::LastMatch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            EngineConfig::from_json(r#"{"log_capacity": 20, "confidence_policy": "max"}"#).unwrap();

        assert_eq!(
            config,
            EngineConfig {
                log_capacity: 20,
                confidence_policy: ConfidencePolicy::Max,
                ..EngineConfig::default()
            }
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = EngineConfig::from_json(r#"{"tick_ms": 0}"#);
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));

        let result = EngineConfig::from_json(r#"{"pause_step": -1.0}"#);
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));

        let result = EngineConfig::from_json("not json");
        assert!(matches!(result, Err(SessionError::JsonError(_))));
    }
}
