//! Coordinated lifecycle management for sensor services.
//!
//! The [`ServiceCoordinator`] owns the registry of sensor services and fans
//! start/stop calls out to them in parallel, one thread per service, joined
//! with a wait-all barrier. A failure in one service is caught and logged
//! without disturbing the others; overlapping lifecycle passes are rejected
//! rather than queued.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sensor::{SensorService, ServiceKind};

/// Pause between stop and start during a restart, giving the backend time to
/// release its capture resources.
const RESTART_SETTLE_DELAY: Duration = Duration::from_millis(250);

/// Errors from coordinator operations.
#[derive(Debug)]
pub enum CoordinatorError {
    /// A start/stop pass is already running; the new request was rejected.
    LifecycleInProgress,
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinatorError::LifecycleInProgress => {
                write!(f, "a lifecycle operation is already in progress")
            }
        }
    }
}

impl std::error::Error for CoordinatorError {}

/// Result of a parallel start/stop pass.
#[derive(Debug, Clone)]
pub struct LifecycleReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// Names of services whose call returned an error.
    pub failed: Vec<String>,
}

/// Live view of one registered service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub kind: ServiceKind,
    pub running: bool,
}

/// Aggregate status of the registry, computed from live handle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub total: usize,
    pub running: usize,
    pub services: BTreeMap<String, bool>,
}

/// Owns the registry of sensor services and their lifecycle.
pub struct ServiceCoordinator {
    registry: Mutex<Vec<Arc<dyn SensorService>>>,
    lifecycle_busy: AtomicBool,
}

/// Clears the busy flag when a lifecycle pass ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ServiceCoordinator {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Vec::new()),
            lifecycle_busy: AtomicBool::new(false),
        }
    }

    /// Register a service. Idempotent: a name already present is ignored.
    pub fn register(&self, service: Arc<dyn SensorService>) {
        let mut registry = self.registry.lock().unwrap();
        if registry.iter().any(|s| s.name() == service.name()) {
            tracing::debug!("Service {} already registered, ignoring", service.name());
            return;
        }
        tracing::info!(
            "Registered {} service: {}",
            service.kind().label(),
            service.name()
        );
        registry.push(service);
    }

    /// Start every registered service in parallel.
    ///
    /// Rejects immediately if another start/stop pass is in flight. Each
    /// service failure is logged individually and does not prevent the
    /// others from starting.
    pub fn start_all(&self) -> Result<LifecycleReport, CoordinatorError> {
        self.run_lifecycle("start", |svc| svc.start().map_err(|e| e.to_string()))
    }

    /// Stop every registered service in parallel. Same discipline as
    /// [`start_all`](Self::start_all).
    pub fn stop_all(&self) -> Result<LifecycleReport, CoordinatorError> {
        self.run_lifecycle("stop", |svc| svc.stop().map_err(|e| e.to_string()))
    }

    fn run_lifecycle(
        &self,
        verb: &str,
        op: impl Fn(&Arc<dyn SensorService>) -> Result<(), String> + Sync,
    ) -> Result<LifecycleReport, CoordinatorError> {
        if self.lifecycle_busy.swap(true, Ordering::SeqCst) {
            tracing::warn!("Rejecting {verb}-all: lifecycle pass already in progress");
            return Err(CoordinatorError::LifecycleInProgress);
        }
        let _guard = BusyGuard(&self.lifecycle_busy);

        // Clone handles out so no lock is held across the fan-out.
        let services: Vec<Arc<dyn SensorService>> = self.registry.lock().unwrap().clone();

        let mut report = LifecycleReport {
            attempted: services.len(),
            succeeded: 0,
            failed: Vec::new(),
        };

        let results: Vec<(String, Result<(), String>)> = thread::scope(|scope| {
            let handles: Vec<_> = services
                .iter()
                .map(|svc| {
                    let op = &op;
                    (svc.name().to_string(), scope.spawn(move || op(svc)))
                })
                .collect();
            handles
                .into_iter()
                .map(|(name, handle)| {
                    let result = handle
                        .join()
                        .unwrap_or_else(|_| Err("panicked during lifecycle call".into()));
                    (name, result)
                })
                .collect()
        });

        for (name, result) in results {
            match result {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    tracing::warn!("Failed to {verb} service {name}: {e}");
                    report.failed.push(name);
                }
            }
        }

        tracing::info!(
            "Lifecycle {verb}-all: {}/{} succeeded",
            report.succeeded,
            report.attempted
        );
        Ok(report)
    }

    /// Restart one service by name: stop, settle, start. Best-effort:
    /// failures are logged, not propagated. Returns whether the service
    /// reports running afterwards.
    pub fn restart(&self, name: &str) -> bool {
        let service = {
            let registry = self.registry.lock().unwrap();
            registry.iter().find(|s| s.name() == name).cloned()
        };
        let Some(service) = service else {
            tracing::warn!("Cannot restart unknown service {name}");
            return false;
        };

        if let Err(e) = service.stop() {
            tracing::debug!("Stop during restart of {name}: {e}");
        }
        thread::sleep(RESTART_SETTLE_DELAY);
        if let Err(e) = service.start() {
            tracing::warn!("Failed to restart service {name}: {e}");
        }
        service.is_running()
    }

    /// Live per-service view: name, kind, running.
    pub fn snapshot(&self) -> Vec<ServiceInfo> {
        let registry = self.registry.lock().unwrap();
        registry
            .iter()
            .map(|s| ServiceInfo {
                name: s.name().to_string(),
                kind: s.kind(),
                running: s.is_running(),
            })
            .collect()
    }

    /// Aggregate status, computed synchronously from current handle state.
    pub fn status(&self) -> CoordinatorStatus {
        let snapshot = self.snapshot();
        CoordinatorStatus {
            total: snapshot.len(),
            running: snapshot.iter().filter(|s| s.running).count(),
            services: snapshot.into_iter().map(|s| (s.name, s.running)).collect(),
        }
    }

    /// Whether every critical service kind has a running instance.
    ///
    /// Logs the missing kind when the answer is no. Never panics; intended
    /// for health checks and status surfaces.
    pub fn critical_services_running(&self) -> bool {
        let snapshot = self.snapshot();
        let mut all_running = true;
        for kind in ServiceKind::CRITICAL {
            let running = snapshot
                .iter()
                .any(|s| s.kind == *kind && s.running);
            if !running {
                tracing::warn!("Critical {} service is not running", kind.label());
                all_running = false;
            }
        }
        all_running
    }

    /// Stop every service of a kind. Per-service failures logged.
    pub fn stop_kind(&self, kind: ServiceKind) {
        for service in self.services_of_kind(kind) {
            if let Err(e) = service.stop() {
                tracing::warn!("Failed to stop {} service {}: {e}", kind.label(), service.name());
            }
        }
    }

    /// Start every service of a kind that is not already running.
    pub fn start_kind(&self, kind: ServiceKind) {
        for service in self.services_of_kind(kind) {
            if service.is_running() {
                continue;
            }
            if let Err(e) = service.start() {
                tracing::warn!(
                    "Failed to start {} service {}: {e}",
                    kind.label(),
                    service.name()
                );
            }
        }
    }

    fn services_of_kind(&self, kind: ServiceKind) -> Vec<Arc<dyn SensorService>> {
        let registry = self.registry.lock().unwrap();
        registry
            .iter()
            .filter(|s| s.kind() == kind)
            .cloned()
            .collect()
    }
}

impl Default for ServiceCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
