//! Session-adaptive monitoring control.
//!
//! The [`SessionController`] subscribes to session-state transitions and
//! keeps the set of active sensor services consistent with the current
//! state: camera capture is suspended while the session is locked (host-OS
//! restriction) and resumed on unlock, with a re-verification pass over the
//! critical services. Remote-connect and logon transitions are recorded as
//! correlation context only.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::event::{EventCategory, EventRecord, SessionChange, SessionState, Severity};
use crate::sensor::ServiceKind;
use crate::services::ServiceCoordinator;

/// Read-only snapshot of the monitoring posture.
///
/// A value type: once computed it is safe to hand to UI/tray observers
/// without any locking. Recomputed on every accepted transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringStatus {
    /// Current session state.
    pub session_state: SessionState,
    /// Per-service-kind activity: `true` when at least one service of that
    /// kind is running.
    pub active: BTreeMap<String, bool>,
    /// Whether every critical service kind has a running instance.
    pub critical_active: bool,
    /// When this snapshot was computed.
    pub computed_at: DateTime<Utc>,
}

struct ControllerState {
    current: SessionState,
    last_transition: DateTime<Utc>,
    subscribers: Vec<Sender<MonitoringStatus>>,
}

/// Maps session transitions to service activation policy.
pub struct SessionController {
    coordinator: Arc<ServiceCoordinator>,
    events_tx: Sender<EventRecord>,
    state: Mutex<ControllerState>,
    source: String,
}

impl SessionController {
    /// Create a controller over the given coordinator. Context events are
    /// emitted on `events_tx` for the aggregator's correlation heuristics.
    pub fn new(coordinator: Arc<ServiceCoordinator>, events_tx: Sender<EventRecord>) -> Self {
        Self {
            coordinator,
            events_tx,
            state: Mutex::new(ControllerState {
                current: SessionState::Unlocked,
                last_transition: DateTime::<Utc>::MIN_UTC,
                subscribers: Vec::new(),
            }),
            source: "session-controller".to_string(),
        }
    }

    /// Current session state.
    pub fn session_state(&self) -> SessionState {
        self.state.lock().unwrap().current
    }

    /// Subscribe to status snapshots. A new snapshot is delivered after
    /// every accepted transition and every reconciliation that changed
    /// something.
    pub fn subscribe(&self) -> Receiver<MonitoringStatus> {
        let (tx, rx) = unbounded();
        self.state.lock().unwrap().subscribers.push(tx);
        rx
    }

    /// Apply one session-state notification.
    ///
    /// Notifications may arrive out of order; one whose timestamp predates
    /// the last accepted transition is discarded.
    pub fn handle_session_change(&self, change: SessionChange) {
        {
            let mut state = self.state.lock().unwrap();
            if change.timestamp < state.last_transition {
                tracing::debug!(
                    "Discarding stale session notification: {} at {}",
                    change.new_state.label(),
                    change.timestamp
                );
                return;
            }
            state.current = change.new_state;
            state.last_transition = change.timestamp;
        }

        tracing::info!("Session transition: {}", change.new_state.label());
        self.emit_context_event(&change);

        match change.new_state {
            SessionState::Locked => {
                // Camera capture is unavailable while the console is locked.
                self.coordinator.stop_kind(ServiceKind::Camera);
                self.emit_event(
                    EventCategory::BackgroundMonitoring,
                    Severity::Info,
                    "Background monitoring active while session locked",
                );
            }
            SessionState::Unlocked => {
                self.coordinator.start_kind(ServiceKind::Camera);
                self.reverify_critical_services();
            }
            SessionState::RemoteConnect
            | SessionState::RemoteDisconnect
            | SessionState::Logon
            | SessionState::Logoff => {
                // Context for correlation only; no activation change.
            }
        }

        self.publish_status();
    }

    /// Reconciliation pass: restart any critical service found inactive for
    /// the current session state. Idempotent: calling it repeatedly when
    /// everything is consistent does nothing.
    ///
    /// Returns the number of services it had to revive.
    pub fn ensure_continuous_monitoring(&self) -> usize {
        let mut revived = 0;
        for info in self.coordinator.snapshot() {
            if !info.kind.is_critical() || info.running {
                continue;
            }
            tracing::warn!(
                "Critical {} service {} inactive, attempting restart",
                info.kind.label(),
                info.name
            );
            if self.coordinator.restart(&info.name) {
                revived += 1;
                self.emit_event(
                    EventCategory::System,
                    Severity::Medium,
                    format!("Recovered {} service {}", info.kind.label(), info.name),
                );
            } else {
                self.emit_event(
                    EventCategory::System,
                    Severity::High,
                    format!(
                        "Critical {} service {} could not be restarted",
                        info.kind.label(),
                        info.name
                    ),
                );
            }
        }

        if revived > 0 {
            self.publish_status();
        }
        revived
    }

    /// Compute the current monitoring-status snapshot.
    pub fn monitoring_status(&self) -> MonitoringStatus {
        let session_state = self.state.lock().unwrap().current;
        let snapshot = self.coordinator.snapshot();

        let mut active: BTreeMap<String, bool> = BTreeMap::new();
        for info in &snapshot {
            let entry = active.entry(info.kind.label().to_string()).or_insert(false);
            *entry = *entry || info.running;
        }

        MonitoringStatus {
            session_state,
            active,
            critical_active: self.coordinator.critical_services_running(),
            computed_at: Utc::now(),
        }
    }

    /// After an unlock, confirm the critical services resumed; attempt one
    /// restart per failed service. A service that stays down is left flagged
    /// inactive in status as degraded monitoring, never a fatal error.
    fn reverify_critical_services(&self) {
        if self.coordinator.critical_services_running() {
            return;
        }
        self.ensure_continuous_monitoring();
    }

    fn emit_context_event(&self, change: &SessionChange) {
        let description = match &change.context {
            Some(context) => format!("Session {}: {}", change.new_state.label(), context),
            None => format!("Session {}", change.new_state.label()),
        };
        let record = EventRecord::with_timestamp(
            EventCategory::Session,
            Severity::Info,
            description,
            self.source.clone(),
            change.timestamp,
        );
        if let Err(e) = self.events_tx.try_send(record) {
            tracing::warn!("Dropping session context event, channel unavailable: {e}");
        }
    }

    fn emit_event(&self, category: EventCategory, severity: Severity, description: impl Into<String>) {
        let record = EventRecord::new(category, severity, description, self.source.clone());
        if let Err(e) = self.events_tx.try_send(record) {
            tracing::warn!("Dropping {} event, channel unavailable: {e}", category.label());
        }
    }

    fn publish_status(&self) {
        let status = self.monitoring_status();
        let mut state = self.state.lock().unwrap();
        state
            .subscribers
            .retain(|tx| tx.try_send(status.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::NoopSensor;
    use chrono::Duration;
    use crossbeam_channel::bounded;

    fn make_controller() -> (
        SessionController,
        Arc<ServiceCoordinator>,
        Receiver<EventRecord>,
    ) {
        let coordinator = Arc::new(ServiceCoordinator::new());
        coordinator.register(Arc::new(NoopSensor::new("input", ServiceKind::Input)));
        coordinator.register(Arc::new(NoopSensor::new("session", ServiceKind::Session)));
        coordinator.register(Arc::new(NoopSensor::new("login", ServiceKind::Login)));
        coordinator.register(Arc::new(NoopSensor::new("camera", ServiceKind::Camera)));
        coordinator.start_all().unwrap();

        let (tx, rx) = bounded(100);
        let controller = SessionController::new(coordinator.clone(), tx);
        (controller, coordinator, rx)
    }

    fn service_running(coordinator: &ServiceCoordinator, name: &str) -> bool {
        coordinator
            .status()
            .services
            .get(name)
            .copied()
            .unwrap_or(false)
    }

    #[test]
    fn test_lock_stops_camera_only() {
        let (controller, coordinator, _rx) = make_controller();

        controller.handle_session_change(SessionChange::new(SessionState::Locked));

        assert!(!service_running(&coordinator, "camera"));
        assert!(service_running(&coordinator, "input"));
        assert!(service_running(&coordinator, "session"));
        assert!(service_running(&coordinator, "login"));
    }

    #[test]
    fn test_unlock_restores_camera() {
        let (controller, coordinator, _rx) = make_controller();

        controller.handle_session_change(SessionChange::new(SessionState::Locked));
        assert!(!service_running(&coordinator, "camera"));

        controller.handle_session_change(SessionChange::new(SessionState::Unlocked));
        assert!(service_running(&coordinator, "camera"));
        assert!(controller.monitoring_status().critical_active);
    }

    #[test]
    fn test_lock_emits_context_and_notification_events() {
        let (controller, _coordinator, rx) = make_controller();

        controller.handle_session_change(SessionChange::new(SessionState::Locked));

        let events: Vec<EventRecord> = rx.try_iter().collect();
        assert!(events
            .iter()
            .any(|e| e.category == EventCategory::Session && e.description.contains("locked")));
        assert!(events
            .iter()
            .any(|e| e.category == EventCategory::BackgroundMonitoring));
    }

    #[test]
    fn test_remote_transitions_do_not_touch_services() {
        let (controller, coordinator, rx) = make_controller();

        controller.handle_session_change(SessionChange::new(SessionState::RemoteConnect));
        controller.handle_session_change(SessionChange::new(SessionState::Logon));

        assert_eq!(coordinator.status().running, 4);
        let events: Vec<EventRecord> = rx.try_iter().collect();
        assert_eq!(
            events
                .iter()
                .filter(|e| e.category == EventCategory::Session)
                .count(),
            2
        );
    }

    #[test]
    fn test_stale_notification_discarded() {
        let (controller, _coordinator, _rx) = make_controller();

        controller.handle_session_change(SessionChange::new(SessionState::Locked));
        let stale = SessionChange {
            new_state: SessionState::Unlocked,
            timestamp: Utc::now() - Duration::seconds(60),
            context: None,
        };
        controller.handle_session_change(stale);

        assert_eq!(controller.session_state(), SessionState::Locked);
    }

    #[test]
    fn test_ensure_continuous_monitoring_revives_criticals() {
        let (controller, coordinator, _rx) = make_controller();

        coordinator.stop_kind(ServiceKind::Input);
        coordinator.stop_kind(ServiceKind::Login);
        assert!(!coordinator.critical_services_running());

        let revived = controller.ensure_continuous_monitoring();
        assert_eq!(revived, 2);
        assert!(coordinator.critical_services_running());

        // Consistent state: a second pass does nothing.
        assert_eq!(controller.ensure_continuous_monitoring(), 0);
    }

    #[test]
    fn test_camera_not_revived_by_reconciliation() {
        let (controller, coordinator, _rx) = make_controller();

        coordinator.stop_kind(ServiceKind::Camera);
        assert_eq!(controller.ensure_continuous_monitoring(), 0);
        assert!(!service_running(&coordinator, "camera"));
    }

    #[test]
    fn test_status_subscription() {
        let (controller, _coordinator, _rx) = make_controller();
        let status_rx = controller.subscribe();

        controller.handle_session_change(SessionChange::new(SessionState::Locked));

        let status = status_rx.try_recv().expect("status should be published");
        assert_eq!(status.session_state, SessionState::Locked);
        assert_eq!(status.active.get("camera"), Some(&false));
        assert_eq!(status.active.get("input"), Some(&true));
        assert!(status.critical_active);
    }
}
