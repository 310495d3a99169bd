//! Input activity debouncing.
//!
//! Raw keyboard/mouse ticks arrive at high frequency from the capture
//! backend. The [`InputDebouncer`] accumulates them into counters and emits
//! one Input-category summary [`EventRecord`] per elapsed sensitivity window,
//! classifying severity from the idle gap that preceded the burst.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;

use crate::event::{EventCategory, EventRecord, Severity};
use crate::sensor::{InputTick, TickKind};

/// Default sensitivity window between summary emissions.
pub const DEFAULT_SENSITIVITY: Duration = Duration::from_secs(30);

/// Idle gap above which a burst is rated High: input resuming after this long
/// an unattended period is the strongest tamper indicator the input path has.
const IDLE_HIGH_THRESHOLD_SECS: i64 = 4 * 60 * 60;

/// Idle gap above which a burst is rated Medium.
const IDLE_MEDIUM_THRESHOLD_SECS: i64 = 60 * 60;

/// Counters for the current accumulation session.
#[derive(Debug)]
struct DebounceState {
    sensitivity: chrono::Duration,
    keystrokes: u64,
    clicks: u64,
    movement: f64,
    /// First tick of the current session, `None` between bursts.
    session_start: Option<DateTime<Utc>>,
    /// Most recent tick of the current session.
    last_input: Option<DateTime<Utc>>,
    /// Last tick of the previous session, for computing the idle gap.
    previous_last_input: Option<DateTime<Utc>>,
}

impl DebounceState {
    fn has_activity(&self) -> bool {
        self.keystrokes > 0 || self.clicks > 0 || self.movement > 0.0
    }
}

/// Converts a raw input tick stream into rate-limited summary events.
///
/// One instance per monitored input sensor. Ticks may arrive on the sensor's
/// capture thread while [`check_elapsed`](Self::check_elapsed) runs on the
/// agent loop; all counter state sits behind a single mutex so no update is
/// lost and no duplicate summary is emitted.
pub struct InputDebouncer {
    state: Mutex<DebounceState>,
    events_tx: Sender<EventRecord>,
    source: String,
}

impl InputDebouncer {
    /// Create a debouncer emitting summaries on `events_tx`.
    pub fn new(events_tx: Sender<EventRecord>, source: impl Into<String>) -> Self {
        Self::with_sensitivity(events_tx, source, DEFAULT_SENSITIVITY)
    }

    /// Create a debouncer with an explicit sensitivity window.
    pub fn with_sensitivity(
        events_tx: Sender<EventRecord>,
        source: impl Into<String>,
        sensitivity: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(DebounceState {
                sensitivity: chrono::Duration::from_std(sensitivity)
                    .unwrap_or_else(|_| chrono::Duration::seconds(30)),
                keystrokes: 0,
                clicks: 0,
                movement: 0.0,
                session_start: None,
                last_input: None,
                previous_last_input: None,
            }),
            events_tx,
            source: source.into(),
        }
    }

    /// Reconfigure the sensitivity window at runtime.
    pub fn set_sensitivity(&self, sensitivity: Duration) {
        let mut state = self.state.lock().unwrap();
        state.sensitivity = chrono::Duration::from_std(sensitivity)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));
    }

    /// Ingest one raw tick. Called from the sensor's capture thread.
    pub fn record_tick(&self, tick: InputTick) {
        let mut state = self.state.lock().unwrap();

        if state.session_start.is_none() {
            state.session_start = Some(tick.timestamp);
        }

        match tick.kind {
            TickKind::Key => state.keystrokes += 1,
            TickKind::Click => state.clicks += 1,
            TickKind::Move { delta } => state.movement += delta,
        }
        state.last_input = Some(tick.timestamp);

        let elapsed = tick.timestamp - state.session_start.unwrap_or(tick.timestamp);
        if elapsed >= state.sensitivity {
            self.emit_summary(&mut state, tick.timestamp);
        }
    }

    /// Flush the session if the sensitivity window has passed without new
    /// ticks. Called periodically from the agent loop so a burst followed by
    /// silence still produces its summary.
    pub fn check_elapsed(&self) {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        if let Some(start) = state.session_start {
            if state.has_activity() && now - start >= state.sensitivity {
                self.emit_summary(&mut state, now);
            }
        }
    }

    /// Emit any unflushed counters as one final summary. Called on stop.
    pub fn flush(&self) {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        if state.has_activity() {
            self.emit_summary(&mut state, now);
        }
    }

    /// Build and send the summary event, then reset for the next session.
    /// Caller holds the state lock.
    fn emit_summary(&self, state: &mut DebounceState, now: DateTime<Utc>) {
        let session_start = state.session_start.unwrap_or(now);
        let elapsed_minutes = ((now - session_start).num_milliseconds() as f64 / 60_000.0).max(
            // Guard against a zero-length session from a single-tick flush.
            1.0 / 60.0,
        );
        let typing_speed = state.keystrokes as f64 / elapsed_minutes;

        let idle_secs = state
            .previous_last_input
            .map(|prev| (session_start - prev).num_seconds().max(0))
            .unwrap_or(0);

        let severity = if idle_secs > IDLE_HIGH_THRESHOLD_SECS {
            Severity::High
        } else if idle_secs > IDLE_MEDIUM_THRESHOLD_SECS {
            Severity::Medium
        } else {
            Severity::Low
        };

        let description = format!(
            "Input activity: {} keystrokes, {} clicks, {:.0} movement, {:.1} keys/min, idle {}s before burst",
            state.keystrokes, state.clicks, state.movement, typing_speed, idle_secs
        );

        let record = EventRecord::with_timestamp(
            EventCategory::Input,
            severity,
            description,
            self.source.clone(),
            now,
        );

        if let Err(e) = self.events_tx.try_send(record) {
            tracing::warn!("Dropping input summary, event channel unavailable: {e}");
        }

        state.previous_last_input = state.last_input;
        state.keystrokes = 0;
        state.clicks = 0;
        state.movement = 0.0;
        state.session_start = None;
        state.last_input = None;
    }
}
