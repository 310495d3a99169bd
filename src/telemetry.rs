//! Cumulative agent telemetry counters.
//!
//! Tracks how much the monitoring pipeline has seen and done (events
//! ingested, persisted, suppressed, alerts delivered) without retaining any
//! event content. Counters optionally persist across sessions so the
//! `status` command can show lifetime totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Atomic counters for the current agent session.
#[derive(Debug)]
pub struct TelemetryLog {
    events_ingested: AtomicU64,
    events_persisted: AtomicU64,
    events_suppressed: AtomicU64,
    alerts_sent: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl TelemetryLog {
    pub fn new() -> Self {
        Self {
            events_ingested: AtomicU64::new(0),
            events_persisted: AtomicU64::new(0),
            events_suppressed: AtomicU64::new(0),
            alerts_sent: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a telemetry log that persists counters to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::debug!("No previous telemetry loaded: {e}");
        }

        log
    }

    pub fn record_event_ingested(&self) {
        self.events_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_persisted(&self) {
        self.events_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_suppressed(&self) {
        self.events_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert_sent(&self) {
        self.alerts_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values.
    pub fn stats(&self) -> TelemetryStats {
        TelemetryStats {
            events_ingested: self.events_ingested.load(Ordering::Relaxed),
            events_persisted: self.events_persisted.load(Ordering::Relaxed),
            events_suppressed: self.events_suppressed.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Display summary for the CLI.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Monitoring Statistics:\n\
             - Events ingested: {}\n\
             - Events persisted: {}\n\
             - Duplicates suppressed: {}\n\
             - Alerts sent: {}\n\
             - Session duration: {} seconds",
            stats.events_ingested,
            stats.events_persisted,
            stats.events_suppressed,
            stats.alerts_sent,
            stats.session_duration_secs
        )
    }

    /// Save counters to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedTelemetry {
                events_ingested: stats.events_ingested,
                events_persisted: stats.events_persisted,
                events_suppressed: stats.events_suppressed,
                alerts_sent: stats.alerts_sent,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedTelemetry =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.events_ingested
                    .store(persisted.events_ingested, Ordering::Relaxed);
                self.events_persisted
                    .store(persisted.events_persisted, Ordering::Relaxed);
                self.events_suppressed
                    .store(persisted.events_suppressed, Ordering::Relaxed);
                self.alerts_sent
                    .store(persisted.alerts_sent, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for TelemetryLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of telemetry counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryStats {
    pub events_ingested: u64,
    pub events_persisted: u64,
    pub events_suppressed: u64,
    pub alerts_sent: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Counter format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedTelemetry {
    events_ingested: u64,
    events_persisted: u64,
    events_suppressed: u64,
    alerts_sent: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared telemetry log.
pub type SharedTelemetry = Arc<TelemetryLog>;

/// Create a new shared telemetry log.
pub fn create_shared_telemetry() -> SharedTelemetry {
    Arc::new(TelemetryLog::new())
}

/// Create a new shared telemetry log with persistence.
pub fn create_shared_telemetry_with_persistence(path: PathBuf) -> SharedTelemetry {
    Arc::new(TelemetryLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let log = TelemetryLog::new();

        log.record_event_ingested();
        log.record_event_ingested();
        log.record_event_suppressed();
        log.record_alert_sent();

        let stats = log.stats();
        assert_eq!(stats.events_ingested, 2);
        assert_eq!(stats.events_suppressed, 1);
        assert_eq!(stats.alerts_sent, 1);
        assert_eq!(stats.events_persisted, 0);
    }

    #[test]
    fn test_summary_format() {
        let log = TelemetryLog::new();
        let summary = log.summary();

        assert!(summary.contains("Events ingested"));
        assert!(summary.contains("Duplicates suppressed"));
        assert!(summary.contains("Alerts sent"));
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.json");

        let log = TelemetryLog::with_persistence(path.clone());
        log.record_event_ingested();
        log.record_event_persisted();
        log.save().unwrap();

        let reloaded = TelemetryLog::with_persistence(path);
        let stats = reloaded.stats();
        assert_eq!(stats.events_ingested, 1);
        assert_eq!(stats.events_persisted, 1);
    }
}
