//! Sensor-facing interfaces for the Deskguard agent.
//!
//! Concrete capture backends (input hooks, camera motion detection, login-log
//! parsing, session notification) live outside this crate. The agent consumes
//! them through the [`SensorService`] contract and the raw/classified event
//! types in [`types`].

pub mod noop;
pub mod types;

// Re-export commonly used types
pub use noop::NoopSensor;
pub use types::{InputTick, SensorNotification, TickKind};

use std::fmt;

/// Kind of sensor service, used for activation policy and health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ServiceKind {
    /// Keyboard/mouse input capture.
    Input,
    /// Motion/camera detection.
    Camera,
    /// Session lock/unlock notification.
    Session,
    /// Login-attempt monitoring.
    Login,
    /// USB device monitoring.
    Usb,
}

impl ServiceKind {
    /// Kinds that must be running for baseline security coverage.
    pub const CRITICAL: &'static [ServiceKind] =
        &[ServiceKind::Input, ServiceKind::Session, ServiceKind::Login];

    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::Input => "input",
            ServiceKind::Camera => "camera",
            ServiceKind::Session => "session",
            ServiceKind::Login => "login",
            ServiceKind::Usb => "usb",
        }
    }

    /// Whether this kind is mandatory for baseline coverage.
    pub fn is_critical(&self) -> bool {
        Self::CRITICAL.contains(self)
    }
}

/// Errors a sensor service can report from lifecycle calls.
#[derive(Debug)]
pub enum ServiceError {
    /// The service was asked to start while already running.
    AlreadyRunning,
    /// The service was asked to stop while not running.
    NotRunning,
    /// The underlying capture backend failed.
    Backend(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::AlreadyRunning => write!(f, "service is already running"),
            ServiceError::NotRunning => write!(f, "service is not running"),
            ServiceError::Backend(e) => write!(f, "sensor backend error: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Contract every monitored sensor service implements.
///
/// Lifecycle calls may arrive from the coordinator's fan-out threads, so
/// implementations must be safe under concurrent invocation. `is_running`
/// must reflect the result of the most recent start/stop call even when that
/// call failed.
pub trait SensorService: Send + Sync {
    /// Stable identity of this service instance.
    fn name(&self) -> &str;

    /// Which activation-policy kind this service belongs to.
    fn kind(&self) -> ServiceKind;

    /// Begin capturing.
    fn start(&self) -> Result<(), ServiceError>;

    /// Stop capturing.
    fn stop(&self) -> Result<(), ServiceError>;

    /// Whether the service is currently capturing.
    fn is_running(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_kinds() {
        assert!(ServiceKind::Input.is_critical());
        assert!(ServiceKind::Session.is_critical());
        assert!(ServiceKind::Login.is_critical());
        assert!(!ServiceKind::Camera.is_critical());
        assert!(!ServiceKind::Usb.is_critical());
    }
}
