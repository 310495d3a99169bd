//! Raw and pre-classified sensor event types.
//!
//! The input path delivers raw [`InputTick`]s that carry nothing beyond a
//! timestamp and a tick kind; the debouncer turns those into summary events.
//! Pre-classified sensors (camera, login, USB) deliver [`SensorNotification`]s
//! that already carry a category and severity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventCategory, EventRecord, Severity};

/// Kind of raw input activity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TickKind {
    /// A key press.
    Key,
    /// A mouse button click.
    Click,
    /// Mouse movement with the distance moved.
    Move { delta: f64 },
}

/// A raw input tick from the capture backend.
///
/// Carries only timing and magnitude, never key content or coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputTick {
    /// When the input occurred.
    pub timestamp: DateTime<Utc>,
    /// What kind of input it was.
    pub kind: TickKind,
}

impl InputTick {
    /// Create a key-press tick stamped with the current time.
    pub fn key() -> Self {
        Self {
            timestamp: Utc::now(),
            kind: TickKind::Key,
        }
    }

    /// Create a click tick stamped with the current time.
    pub fn click() -> Self {
        Self {
            timestamp: Utc::now(),
            kind: TickKind::Click,
        }
    }

    /// Create a movement tick from deltas, stamped with the current time.
    pub fn movement(delta_x: f64, delta_y: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: TickKind::Move {
                delta: (delta_x * delta_x + delta_y * delta_y).sqrt(),
            },
        }
    }

    /// Create a tick with an explicit timestamp.
    pub fn at(kind: TickKind, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, kind }
    }
}

/// Activity notification from a pre-classified sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorNotification {
    /// Category the sensor assigned.
    pub category: EventCategory,
    /// When the activity was detected.
    pub timestamp: DateTime<Utc>,
    /// What was detected.
    pub description: String,
    /// Severity the sensor assigned.
    pub severity: Severity,
    /// Identity of the emitting sensor.
    pub source: String,
}

impl SensorNotification {
    pub fn new(
        category: EventCategory,
        severity: Severity,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            category,
            timestamp: Utc::now(),
            description: description.into(),
            severity,
            source: source.into(),
        }
    }

    /// Convert into the normalized record the aggregator consumes.
    pub fn into_record(self) -> EventRecord {
        EventRecord::with_timestamp(
            self.category,
            self.severity,
            self.description,
            self.source,
            self.timestamp,
        )
    }
}
