//! Event aggregation: deduplication, throttling, and alert decisioning.
//!
//! The [`EventAggregator`] is the single funnel for every normalized event in
//! the agent. For each incoming record it prunes the sliding window, applies
//! the duplicate-suppression policy, persists accepted records through the
//! [`EventSink`], and evaluates the alerting rules: a severity gate plus two
//! correlation heuristics over a trailing sub-window.

pub mod window;

pub use window::AggregationWindow;

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventCategory, EventRecord, Severity};
use crate::sink::{AlertSender, EventSink};

/// Minimum interval between prune passes over the window state.
const PRUNE_INTERVAL_SECS: i64 = 60;

/// Trailing span the alert spam cap looks back over.
const ALERT_SPAM_WINDOW_SECS: i64 = 10 * 60;

/// High-severity alerts allowed within the spam window. Criticals always go
/// out; this cap keeps a misbehaving sensor from drowning the alert channel.
const ALERT_SPAM_CAP: usize = 5;

/// Trailing sub-window the correlation heuristics inspect.
const CORRELATION_WINDOW_SECS: i64 = 15 * 60;

/// Failed logins within the correlation window that indicate a credential
/// attack regardless of individual severities.
const FAILED_LOGIN_ALERT_THRESHOLD: usize = 3;

/// Session transitions within the correlation window that, combined with at
/// least one input event, suggest unauthorized physical access.
const SESSION_CHURN_ALERT_THRESHOLD: usize = 2;

/// Prior occurrences (the original plus one duplicate) after which a Low
/// severity record is suppressed. The first occurrence always surfaces.
const LOW_SUPPRESS_PRIOR_COUNT: usize = 2;

/// Prior occurrences (the original plus three duplicates) after which a
/// Medium severity record is suppressed.
const MEDIUM_SUPPRESS_PRIOR_COUNT: usize = 4;

/// What the aggregator did with a submitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Rejected at the boundary; no state was touched.
    Rejected,
    /// Inserted into the window but filtered out as duplicate noise.
    Suppressed,
    /// Persisted; `alerted` reports whether an alert was delivered.
    Processed { alerted: bool },
}

/// Slim entry kept for correlation queries, which look farther back than the
/// deduplication window retains full records.
#[derive(Debug, Clone)]
struct TrailEntry {
    timestamp: DateTime<Utc>,
    category: EventCategory,
    failed_login: bool,
}

/// Point-in-time aggregator statistics, computed on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorStats {
    pub total_events: u64,
    pub total_processed: u64,
    pub total_suppressed: u64,
    pub total_alerts_sent: u64,
    pub events_last_5m: usize,
    pub events_last_15m: usize,
    pub alerts_last_10m: usize,
    pub by_category_15m: BTreeMap<String, u64>,
}

#[derive(Debug)]
struct AggregatorInner {
    window: AggregationWindow,
    /// Category trail retained for the correlation window.
    trail: VecDeque<TrailEntry>,
    /// Delivery times and severities of sent alerts, for the spam cap.
    alerts_sent: VecDeque<(DateTime<Utc>, Severity)>,
    total_events: u64,
    total_processed: u64,
    total_suppressed: u64,
    total_alerts: u64,
}

/// Single funnel for all normalized events.
///
/// Safe to call from any sensor context: all window state sits behind one
/// mutex, and collaborator failures are contained: a failing sink or alerter
/// never propagates into the caller.
pub struct EventAggregator {
    inner: Mutex<AggregatorInner>,
    sink: Arc<dyn EventSink>,
    alerter: Arc<dyn AlertSender>,
}

impl EventAggregator {
    pub fn new(sink: Arc<dyn EventSink>, alerter: Arc<dyn AlertSender>) -> Self {
        Self {
            inner: Mutex::new(AggregatorInner {
                window: AggregationWindow::new(),
                trail: VecDeque::new(),
                alerts_sent: VecDeque::new(),
                total_events: 0,
                total_processed: 0,
                total_suppressed: 0,
                total_alerts: 0,
            }),
            sink,
            alerter,
        }
    }

    /// Submit one event to the pipeline.
    ///
    /// Persistence happens before alert evaluation; an alert failure leaves
    /// the persisted record in place and the record's `alert_sent` false.
    pub fn process_event(&self, record: EventRecord) -> ProcessOutcome {
        if record.description.trim().is_empty() {
            tracing::debug!(
                "Rejecting event from {} with blank description",
                record.source
            );
            return ProcessOutcome::Rejected;
        }

        let now = Utc::now();
        let record_id = record.id;

        // Decide under the lock, then talk to collaborators without it so a
        // slow sink cannot stall other submitters on the mutex.
        let should_alert = {
            let mut inner = self.inner.lock().unwrap();
            inner.total_events += 1;

            if inner
                .window
                .prune_due(now, Duration::seconds(PRUNE_INTERVAL_SECS))
            {
                inner.window.prune(now);
                Self::prune_histories(&mut inner, now);
            }

            inner.window.insert(record.clone());
            inner.trail.push_back(TrailEntry {
                timestamp: record.timestamp,
                category: record.category,
                failed_login: record.category == EventCategory::Login
                    && record.description.to_lowercase().contains("fail"),
            });

            if !Self::should_process(&inner.window, &record) {
                inner.total_suppressed += 1;
                tracing::debug!(
                    "Suppressed duplicate {} event: {}",
                    record.category.label(),
                    record.description
                );
                return ProcessOutcome::Suppressed;
            }
            inner.total_processed += 1;

            Self::should_alert(&inner, &record, now)
        };

        if let Err(e) = self.sink.persist(&record) {
            tracing::warn!("Failed to persist event {record_id}: {e}");
        }

        if !should_alert {
            return ProcessOutcome::Processed { alerted: false };
        }

        match self.alerter.send_alert(&record) {
            Ok(()) => {
                let mut inner = self.inner.lock().unwrap();
                inner.window.mark_alert_sent(record_id);
                inner.alerts_sent.push_back((Utc::now(), record.severity));
                inner.total_alerts += 1;
                ProcessOutcome::Processed { alerted: true }
            }
            Err(e) => {
                // The record stays persisted and alert_sent stays false, so a
                // later correlated event can re-trigger delivery.
                tracing::warn!("Alert delivery failed for event {record_id}: {e}");
                ProcessOutcome::Processed { alerted: false }
            }
        }
    }

    /// Duplicate-suppression policy.
    ///
    /// Critical and High severity always pass. For the rest, the first
    /// occurrence always surfaces; Low goes quiet once one duplicate exists
    /// and Medium once three do. Info and below-threshold counts pass.
    fn should_process(window: &AggregationWindow, record: &EventRecord) -> bool {
        if record.severity >= Severity::High {
            return true;
        }

        let priors = window.count_duplicates(record.category, &record.description, record.id);
        if priors == 0 {
            return true;
        }

        match record.severity {
            Severity::Low => priors < LOW_SUPPRESS_PRIOR_COUNT,
            Severity::Medium => priors < MEDIUM_SUPPRESS_PRIOR_COUNT,
            _ => true,
        }
    }

    /// Alert policy: severity gate, spam cap, then correlation heuristics.
    fn should_alert(inner: &AggregatorInner, record: &EventRecord, now: DateTime<Utc>) -> bool {
        match record.severity {
            Severity::Critical => true,
            Severity::High => {
                let spam_cutoff = now - Duration::seconds(ALERT_SPAM_WINDOW_SECS);
                let recent_high = inner
                    .alerts_sent
                    .iter()
                    .filter(|(ts, sev)| *ts >= spam_cutoff && *sev >= Severity::High)
                    .count();
                if recent_high >= ALERT_SPAM_CAP {
                    tracing::debug!(
                        "High severity alert suppressed by spam cap ({recent_high} recent)"
                    );
                    false
                } else {
                    true
                }
            }
            _ => Self::correlation_alert(inner, now),
        }
    }

    /// Correlation heuristics over the trailing sub-window: repeated failed
    /// logins, or session churn coinciding with input activity.
    fn correlation_alert(inner: &AggregatorInner, now: DateTime<Utc>) -> bool {
        let cutoff = now - Duration::seconds(CORRELATION_WINDOW_SECS);

        let failed_logins = inner
            .trail
            .iter()
            .filter(|e| e.failed_login && e.timestamp >= cutoff)
            .count();
        if failed_logins >= FAILED_LOGIN_ALERT_THRESHOLD {
            tracing::info!("Correlation alert: {failed_logins} failed logins in window");
            return true;
        }

        let sessions = inner
            .trail
            .iter()
            .filter(|e| e.category == EventCategory::Session && e.timestamp >= cutoff)
            .count();
        let inputs = inner
            .trail
            .iter()
            .filter(|e| e.category == EventCategory::Input && e.timestamp >= cutoff)
            .count();
        if sessions >= SESSION_CHURN_ALERT_THRESHOLD && inputs >= 1 {
            tracing::info!(
                "Correlation alert: {sessions} session transitions with input activity"
            );
            return true;
        }

        false
    }

    /// Drop correlation-trail and alert-history entries past their spans.
    fn prune_histories(inner: &mut AggregatorInner, now: DateTime<Utc>) {
        let trail_cutoff = now - Duration::seconds(CORRELATION_WINDOW_SECS);
        while inner
            .trail
            .front()
            .is_some_and(|e| e.timestamp < trail_cutoff)
        {
            inner.trail.pop_front();
        }

        let alert_cutoff = now - Duration::seconds(ALERT_SPAM_WINDOW_SECS);
        while inner
            .alerts_sent
            .front()
            .is_some_and(|(ts, _)| *ts < alert_cutoff)
        {
            inner.alerts_sent.pop_front();
        }
    }

    /// Point-in-time statistics snapshot. Read-only; never mutates state.
    pub fn stats(&self) -> AggregatorStats {
        let inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let cutoff_5m = now - Duration::seconds(window::DEFAULT_HORIZON_SECS);
        let cutoff_15m = now - Duration::seconds(CORRELATION_WINDOW_SECS);
        let cutoff_10m = now - Duration::seconds(ALERT_SPAM_WINDOW_SECS);

        let mut by_category: BTreeMap<String, u64> = BTreeMap::new();
        for entry in inner.trail.iter().filter(|e| e.timestamp >= cutoff_15m) {
            *by_category
                .entry(entry.category.label().to_string())
                .or_insert(0) += 1;
        }

        AggregatorStats {
            total_events: inner.total_events,
            total_processed: inner.total_processed,
            total_suppressed: inner.total_suppressed,
            total_alerts_sent: inner.total_alerts,
            events_last_5m: inner
                .trail
                .iter()
                .filter(|e| e.timestamp >= cutoff_5m)
                .count(),
            events_last_15m: inner
                .trail
                .iter()
                .filter(|e| e.timestamp >= cutoff_15m)
                .count(),
            alerts_last_10m: inner
                .alerts_sent
                .iter()
                .filter(|(ts, _)| *ts >= cutoff_10m)
                .count(),
            by_category_15m: by_category,
        }
    }
}
