//! Persistence and alert-delivery collaborator seams.
//!
//! The aggregator talks to storage and alerting through these traits.
//! Real deployments plug in a database sink or an SMS/e-mail alerter; the
//! reference implementations here write JSON lines to disk and log alerts,
//! which is enough to run the agent end to end.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::event::EventRecord;

/// Errors from the persistence collaborator.
#[derive(Debug)]
pub enum SinkError {
    Io(String),
    Serialize(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "IO error: {e}"),
            SinkError::Serialize(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Errors from the alert-delivery collaborator.
#[derive(Debug)]
pub enum AlertError {
    Delivery(String),
}

impl fmt::Display for AlertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertError::Delivery(e) => write!(f, "Alert delivery failed: {e}"),
        }
    }
}

impl std::error::Error for AlertError {}

/// Persistence collaborator: store one event record.
pub trait EventSink: Send + Sync {
    fn persist(&self, record: &EventRecord) -> Result<(), SinkError>;
}

/// Alert-delivery collaborator: deliver an alert for one event record.
pub trait AlertSender: Send + Sync {
    fn send_alert(&self, record: &EventRecord) -> Result<(), AlertError>;
}

/// Append-only JSON-lines event store.
pub struct JsonlEventSink {
    path: PathBuf,
    // One writer at a time keeps lines whole under concurrent persists.
    write_lock: Mutex<()>,
}

impl JsonlEventSink {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl EventSink for JsonlEventSink {
    fn persist(&self, record: &EventRecord) -> Result<(), SinkError> {
        let line =
            serde_json::to_string(record).map_err(|e| SinkError::Serialize(e.to_string()))?;

        let _guard = self.write_lock.lock().unwrap();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SinkError::Io(e.to_string()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SinkError::Io(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| SinkError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Alert sender that logs at WARN instead of delivering externally.
#[derive(Default)]
pub struct TracingAlertSender;

impl AlertSender for TracingAlertSender {
    fn send_alert(&self, record: &EventRecord) -> Result<(), AlertError> {
        tracing::warn!(
            "ALERT [{}/{:?}] {} (source: {})",
            record.category.label(),
            record.severity,
            record.description,
            record.source
        );
        Ok(())
    }
}
