//! The sliding window of recently-seen events.
//!
//! Holds every record inserted within the aggregation horizon, including
//! suppressed duplicates, so the filtering policy can count how often an
//! identical event has already been seen. Pruning is lazy: the aggregator
//! asks for it at most once per minute.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::event::{EventCategory, EventRecord};

/// Default aggregation horizon: duplicates within this span are related.
pub const DEFAULT_HORIZON_SECS: i64 = 5 * 60;

/// A time-bounded set of recently-seen event records.
#[derive(Debug)]
pub struct AggregationWindow {
    records: Vec<EventRecord>,
    horizon: Duration,
    last_prune: DateTime<Utc>,
}

impl AggregationWindow {
    pub fn new() -> Self {
        Self::with_horizon(Duration::seconds(DEFAULT_HORIZON_SECS))
    }

    pub fn with_horizon(horizon: Duration) -> Self {
        Self {
            records: Vec::new(),
            horizon,
            last_prune: Utc::now(),
        }
    }

    /// Insert a record. The caller prunes first when due.
    pub fn insert(&mut self, record: EventRecord) {
        self.records.push(record);
    }

    /// Drop every record older than the horizon relative to `now`.
    ///
    /// Idempotent and order-independent: after a pass, the window contains
    /// exactly the records with timestamps within the horizon.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.horizon;
        self.records.retain(|r| r.timestamp > cutoff);
        self.last_prune = now;
    }

    /// Whether a prune pass is due, given the prune interval.
    pub fn prune_due(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        now - self.last_prune >= interval
    }

    /// Count records matching the same category and description, excluding
    /// the record identified by `exclude`.
    pub fn count_duplicates(
        &self,
        category: EventCategory,
        description: &str,
        exclude: Uuid,
    ) -> usize {
        self.records
            .iter()
            .filter(|r| r.id != exclude && r.category == category && r.description == description)
            .count()
    }

    /// Mark the stored copy of a record as alerted.
    pub fn mark_alert_sent(&mut self, id: Uuid) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.mark_alert_sent();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }
}

impl Default for AggregationWindow {
    fn default() -> Self {
        Self::new()
    }
}
