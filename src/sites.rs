//! Per-domain influence aggregation
//!
//! One running record per domain, updated incrementally on every tracked
//! event. Records keep first-seen order, which is the order the export dump
//! lists them in.

use crate::config::DEFAULT_SITE_CAPACITY;
use crate::types::{InfluenceClass, SiteData, SiteEntry, SiteInfluence};
use std::collections::HashMap;
use tracing::debug;

/// Weight of the mood average in the engagement blend
const ENGAGEMENT_MOOD_WEIGHT: f64 = 0.6;

/// Weight of the (percent-scaled) event value in the engagement blend
const ENGAGEMENT_VALUE_WEIGHT: f64 = 0.4;

/// Rows shown in the site comparison view
pub const DEFAULT_SITE_VIEW_LIMIT: usize = 8;

#[derive(Debug, Clone)]
struct Slot {
    data: SiteData,
    /// Sequence number of the last update, for eviction
    touched: u64,
}

/// Capacity-bounded site table
#[derive(Debug, Clone)]
pub struct SiteAggregator {
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
    capacity: usize,
    sequence: u64,
}

impl Default for SiteAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_CAPACITY)
    }
}

impl SiteAggregator {
    /// Create a table holding at most `capacity` domains
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            capacity,
            sequence: 0,
        }
    }

    /// Fold one event into the domain's record.
    ///
    /// A domain seen for the first time starts with its mood average at the
    /// current global score. `event_value` is expected roughly in 0..=100 but is
    /// not clamped.
    pub fn record(&mut self, domain: &str, current_score: f64, event_value: f64) -> &SiteData {
        self.sequence += 1;
        let existing = self.index.get(domain).copied();
        let position = match existing {
            Some(position) => position,
            None => self.insert(domain, current_score),
        };

        let slot = &mut self.slots[position];
        slot.touched = self.sequence;

        let site = &mut slot.data;
        site.event_count = site.event_count.saturating_add(1);
        site.mood_average = (site.mood_average + current_score) / 2.0;
        site.engagement_score = compute_engagement(site.mood_average, event_value);
        site
    }

    fn insert(&mut self, domain: &str, current_score: f64) -> usize {
        if self.slots.len() >= self.capacity {
            self.evict_least_recent();
        }
        self.slots.push(Slot {
            data: SiteData::seeded(domain, current_score),
            touched: self.sequence,
        });
        let position = self.slots.len() - 1;
        self.index.insert(domain.to_string(), position);
        position
    }

    fn evict_least_recent(&mut self) {
        let Some(oldest) = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(_, slot)| slot.touched)
            .map(|(position, _)| position)
        else {
            return;
        };

        let evicted = self.slots.remove(oldest);
        debug!(domain = %evicted.data.domain, "site table full, evicting least recent domain");
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .slots
            .iter()
            .enumerate()
            .map(|(position, slot)| (slot.data.domain.clone(), position))
            .collect();
    }

    /// Record for `domain`, if tracked
    pub fn get(&self, domain: &str) -> Option<&SiteData> {
        self.index.get(domain).map(|&position| &self.slots[position].data)
    }

    /// Records in first-seen order
    pub fn entries(&self) -> Vec<SiteData> {
        self.slots.iter().map(|slot| slot.data.clone()).collect()
    }

    /// Domains by mood average, highest first. Ties keep first-seen order.
    pub fn ranked(&self) -> Vec<SiteInfluence> {
        let mut ranked: Vec<SiteInfluence> = self
            .slots
            .iter()
            .map(|slot| SiteInfluence {
                domain: slot.data.domain.clone(),
                mood: slot.data.mood_average,
            })
            .collect();
        // sort_by is stable
        ranked.sort_by(|a, b| b.mood.total_cmp(&a.mood));
        ranked
    }

    /// Comparison rows for the first `limit` domains in first-seen order
    pub fn classified(&self, limit: usize) -> Vec<SiteEntry> {
        self.slots
            .iter()
            .take(limit)
            .map(|slot| SiteEntry {
                domain: slot.data.domain.clone(),
                mood: slot.data.mood_average,
                influence: InfluenceClass::from_mood_average(slot.data.mood_average),
                time_spent: slot.data.time_spent,
            })
            .collect()
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Engagement blend: `mood_average * 0.6 + (value / 100) * 0.4`
fn compute_engagement(mood_average: f64, event_value: f64) -> f64 {
    mood_average * ENGAGEMENT_MOOD_WEIGHT + (event_value / 100.0) * ENGAGEMENT_VALUE_WEIGHT
}
