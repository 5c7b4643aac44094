//! Bounded behavior event log
//!
//! Keeps the most recent events in arrival order for timeline reconstruction
//! and export. Oldest events are evicted first once the capacity is reached.

use crate::config::DEFAULT_LOG_CAPACITY;
use crate::types::{BehaviorEvent, BehaviorEventType, TimelinePoint};
use std::collections::VecDeque;

/// Number of minute buckets the timeline shows
pub const TIMELINE_POINTS: usize = 10;

/// Insertion-ordered, capacity-bounded event log
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<BehaviorEvent>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl EventLog {
    /// Create a log holding at most `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event, dropping from the front past capacity
    pub fn append(&mut self, event: BehaviorEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// Remove every event
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Owned copy of the log, oldest first
    pub fn snapshot(&self) -> Vec<BehaviorEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Group events by UTC minute, in the order each minute was first seen,
    /// and return the last [`TIMELINE_POINTS`] groups.
    pub fn timeline(&self) -> Vec<TimelinePoint> {
        let mut groups: Vec<(String, f64, usize, BehaviorEventType)> = Vec::new();

        for event in &self.events {
            let minute = event.timestamp.format("%H:%M").to_string();
            match groups.iter_mut().find(|(time, ..)| *time == minute) {
                Some((_, sum, count, _)) => {
                    *sum += event.value;
                    *count += 1;
                }
                None => groups.push((minute, event.value, 1, event.event_type)),
            }
        }

        let skip = groups.len().saturating_sub(TIMELINE_POINTS);
        groups
            .into_iter()
            .skip(skip)
            .map(|(time, sum, count, label)| TimelinePoint {
                time,
                mood: round_half_up(sum / count as f64),
                label,
            })
            .collect()
    }
}

/// Nearest integer, with halves rounded toward positive infinity
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
