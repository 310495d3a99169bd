//! Core event types for the Deskguard agent.
//!
//! An [`EventRecord`] is the normalized unit of monitored activity flowing
//! from the sensors into the aggregation pipeline. Session transitions are
//! delivered separately as [`SessionChange`] notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a monitored event.
///
/// This is a closed set: filtering, correlation, and severity policy all
/// match exhaustively on it, so a new category is compile-time-checked at
/// every decision point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Keyboard/mouse activity summaries from the input debouncer.
    Input,
    /// Login attempts observed by the login sensor.
    Login,
    /// Motion/camera detections.
    Camera,
    /// Session lock/unlock and remote-connect transitions.
    Session,
    /// Agent-internal events (service failures, restarts).
    System,
    /// Background-monitoring lifecycle notifications.
    BackgroundMonitoring,
    /// USB device attach/detach.
    Usb,
}

impl EventCategory {
    /// Short label used in log lines and the event sink.
    pub fn label(&self) -> &'static str {
        match self {
            EventCategory::Input => "input",
            EventCategory::Login => "login",
            EventCategory::Camera => "camera",
            EventCategory::Session => "session",
            EventCategory::System => "system",
            EventCategory::BackgroundMonitoring => "background-monitoring",
            EventCategory::Usb => "usb",
        }
    }
}

/// Severity level for an event, used by the filtering and alerting policy.
///
/// The ordering is significant: `Info < Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational, no action required.
    Info,
    /// Low severity -- logged but unlikely to need intervention.
    Low,
    /// Medium severity -- worth reviewing.
    Medium,
    /// High severity -- likely requires user attention.
    High,
    /// Critical severity -- immediate action recommended.
    Critical,
}

/// A normalized monitored-activity event.
///
/// Severity and category are fixed at construction. The `alert_sent` flag
/// transitions false to true at most once, via [`EventRecord::mark_alert_sent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier for this record.
    pub id: Uuid,
    /// When the activity occurred.
    pub timestamp: DateTime<Utc>,
    /// Category of the activity.
    pub category: EventCategory,
    /// Human-readable description of what was observed.
    pub description: String,
    /// Assessed severity.
    pub severity: Severity,
    /// Whether an alert has been delivered for this record.
    pub alert_sent: bool,
    /// Identity of the sensor that produced the record.
    pub source: String,
}

impl EventRecord {
    /// Create a new record stamped with the current time.
    pub fn new(
        category: EventCategory,
        severity: Severity,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self::with_timestamp(category, severity, description, source, Utc::now())
    }

    /// Create a new record with an explicit timestamp.
    pub fn with_timestamp(
        category: EventCategory,
        severity: Severity,
        description: impl Into<String>,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            category,
            description: description.into(),
            severity,
            alert_sent: false,
            source: source.into(),
        }
    }

    /// Record that an alert was delivered. Monotonic: once set it stays set.
    pub fn mark_alert_sent(&mut self) {
        self.alert_sent = true;
    }
}

/// Session state of the interactive desktop session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Console session is unlocked and interactive.
    Unlocked,
    /// Console session is locked.
    Locked,
    /// A remote session connected.
    RemoteConnect,
    /// A remote session disconnected.
    RemoteDisconnect,
    /// A user logged on.
    Logon,
    /// A user logged off.
    Logoff,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Unlocked => "unlocked",
            SessionState::Locked => "locked",
            SessionState::RemoteConnect => "remote-connect",
            SessionState::RemoteDisconnect => "remote-disconnect",
            SessionState::Logon => "logon",
            SessionState::Logoff => "logoff",
        }
    }
}

/// Notification from the session-change collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionChange {
    /// The state the session transitioned into.
    pub new_state: SessionState,
    /// When the transition occurred. Deliveries may arrive out of order;
    /// consumers compare timestamps and discard stale notifications.
    pub timestamp: DateTime<Utc>,
    /// Optional free-text context from the notifier.
    pub context: Option<String>,
}

impl SessionChange {
    pub fn new(new_state: SessionState) -> Self {
        Self {
            new_state,
            timestamp: Utc::now(),
            context: None,
        }
    }

    pub fn with_context(new_state: SessionState, context: impl Into<String>) -> Self {
        Self {
            new_state,
            timestamp: Utc::now(),
            context: Some(context.into()),
        }
    }
}
