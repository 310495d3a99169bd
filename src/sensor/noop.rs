//! A sensor service that captures nothing.
//!
//! This exists so the agent binary can run on hosts without any capture
//! backend wired in, while still exercising the full lifecycle and policy
//! machinery. It also serves as the base for stub services in tests.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::sensor::{SensorService, ServiceError, ServiceKind};

/// A no-op sensor: start/stop flip the running flag, no events are produced.
pub struct NoopSensor {
    name: String,
    kind: ServiceKind,
    running: AtomicBool,
}

impl NoopSensor {
    pub fn new(name: impl Into<String>, kind: ServiceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            running: AtomicBool::new(false),
        }
    }
}

impl SensorService for NoopSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ServiceKind {
        self.kind
    }

    fn start(&self) -> Result<(), ServiceError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::AlreadyRunning);
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), ServiceError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let sensor = NoopSensor::new("input", ServiceKind::Input);
        assert!(!sensor.is_running());

        sensor.start().unwrap();
        assert!(sensor.is_running());

        // Second start is rejected
        assert!(matches!(sensor.start(), Err(ServiceError::AlreadyRunning)));

        sensor.stop().unwrap();
        assert!(!sensor.is_running());
    }
}
