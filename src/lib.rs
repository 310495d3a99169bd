//! Deskguard Agent - coordination core for continuous desktop security monitoring.
//!
//! This library ingests raw activity signals from independent sensor services
//! (keyboard/mouse input, camera motion, session transitions, login attempts),
//! reduces noise through debouncing and time-windowed correlation, decides
//! which events warrant persistence and alerting, and keeps the active sensor
//! set consistent with the desktop session state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Deskguard Agent                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐  ticks   ┌───────────┐  events  ┌───────────┐  │
//! │  │ Sensors  │─────────▶│ Debouncer │─────────▶│Aggregator │  │
//! │  │          │──────────────────────────────── ▶│           │  │
//! │  └──────────┘  classified events              └─────┬─────┘  │
//! │       ▲                                             │        │
//! │       │ start/stop                        persist / alert    │
//! │  ┌────┴────────┐   session changes   ┌──────────────▼────┐   │
//! │  │ Coordinator │◀────────────────────│ Sink / Alerter    │   │
//! │  │             │   (controller)      └───────────────────┘   │
//! │  └─────────────┘                                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lifecycle faults never block event correlation, and event floods never
//! block lifecycle operations: the coordinator/controller pair and the
//! aggregator share nothing but the service registry's public interface.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use deskguard_agent::{
//!     aggregate::EventAggregator,
//!     sink::{JsonlEventSink, TracingAlertSender},
//!     event::{EventCategory, EventRecord, Severity},
//! };
//!
//! let sink = Arc::new(JsonlEventSink::new("events.jsonl".into()));
//! let alerter = Arc::new(TracingAlertSender);
//! let aggregator = EventAggregator::new(sink, alerter);
//!
//! let record = EventRecord::new(
//!     EventCategory::Login,
//!     Severity::Medium,
//!     "Failed login attempt for user admin",
//!     "login-sensor",
//! );
//! aggregator.process_event(record);
//! ```

pub mod aggregate;
pub mod config;
pub mod debounce;
pub mod event;
pub mod sensor;
pub mod services;
pub mod session;
pub mod sink;
pub mod telemetry;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use aggregate::{AggregationWindow, AggregatorStats, EventAggregator, ProcessOutcome};
pub use config::Config;
pub use debounce::InputDebouncer;
pub use event::{EventCategory, EventRecord, SessionChange, SessionState, Severity};
pub use sensor::{InputTick, NoopSensor, SensorService, ServiceKind, TickKind};
pub use services::{CoordinatorStatus, LifecycleReport, ServiceCoordinator};
pub use session::{MonitoringStatus, SessionController};
pub use sink::{AlertSender, EventSink, JsonlEventSink, TracingAlertSender};
pub use telemetry::{SharedTelemetry, TelemetryLog, TelemetryStats};

// Server re-exports (when enabled)
#[cfg(feature = "server")]
pub use server::{run_server, ServerConfig, ServerState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
