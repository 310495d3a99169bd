//! End-to-end tests of the monitoring pipeline: sensors through debouncing,
//! aggregation, persistence, and alerting, plus session-adaptive lifecycle
//! control.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver};

use deskguard_agent::{
    aggregate::{EventAggregator, ProcessOutcome},
    debounce::InputDebouncer,
    event::{EventCategory, EventRecord, SessionChange, SessionState, Severity},
    sensor::{InputTick, NoopSensor, ServiceKind, TickKind},
    services::ServiceCoordinator,
    session::SessionController,
    sink::{AlertError, AlertSender, EventSink, SinkError},
};

#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    fn persisted(&self) -> Vec<EventRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl EventSink for MemorySink {
    fn persist(&self, record: &EventRecord) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MemoryAlerter {
    alerts: Mutex<Vec<EventRecord>>,
}

impl MemoryAlerter {
    fn sent(&self) -> Vec<EventRecord> {
        self.alerts.lock().unwrap().clone()
    }
}

impl AlertSender for MemoryAlerter {
    fn send_alert(&self, record: &EventRecord) -> Result<(), AlertError> {
        self.alerts.lock().unwrap().push(record.clone());
        Ok(())
    }
}

fn drain_into(
    rx: &Receiver<EventRecord>,
    aggregator: &EventAggregator,
) -> Vec<ProcessOutcome> {
    let mut outcomes = Vec::new();
    while let Ok(record) = rx.try_recv() {
        outcomes.push(aggregator.process_event(record));
    }
    outcomes
}

fn backdated_tick(kind: TickKind, seconds_ago: i64) -> InputTick {
    InputTick::at(kind, Utc::now() - chrono::Duration::seconds(seconds_ago))
}

#[test]
fn test_input_burst_flows_through_pipeline() {
    let (events_tx, events_rx) = bounded(100);
    let sink = Arc::new(MemorySink::default());
    let alerter = Arc::new(MemoryAlerter::default());
    let aggregator = EventAggregator::new(sink.clone(), alerter);

    let debouncer =
        InputDebouncer::with_sensitivity(events_tx, "input-sensor", Duration::from_secs(30));

    // A burst of 50 keystrokes, then silence past the sensitivity window.
    for _ in 0..50 {
        debouncer.record_tick(backdated_tick(TickKind::Key, 31));
    }
    debouncer.check_elapsed();

    let outcomes = drain_into(&events_rx, &aggregator);
    assert_eq!(outcomes.len(), 1, "exactly one summary event expected");

    let persisted = sink.persisted();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].category, EventCategory::Input);
    assert!(persisted[0].description.contains("50 keystrokes"));
}

#[test]
fn test_debouncer_stop_flushes_remaining_input() {
    let (events_tx, events_rx) = bounded(100);
    let sink = Arc::new(MemorySink::default());
    let alerter = Arc::new(MemoryAlerter::default());
    let aggregator = EventAggregator::new(sink.clone(), alerter);

    let debouncer =
        InputDebouncer::with_sensitivity(events_tx, "input-sensor", Duration::from_secs(30));

    for _ in 0..5 {
        debouncer.record_tick(InputTick::key());
    }
    debouncer.flush();

    let outcomes = drain_into(&events_rx, &aggregator);
    assert_eq!(outcomes.len(), 1);
    assert!(sink.persisted()[0].description.contains("5 keystrokes"));
}

#[test]
fn test_session_churn_with_input_raises_alert() {
    let coordinator = Arc::new(ServiceCoordinator::new());
    coordinator.register(Arc::new(NoopSensor::new("input", ServiceKind::Input)));
    coordinator.register(Arc::new(NoopSensor::new("session", ServiceKind::Session)));
    coordinator.register(Arc::new(NoopSensor::new("login", ServiceKind::Login)));
    coordinator.register(Arc::new(NoopSensor::new("camera", ServiceKind::Camera)));
    coordinator.start_all().unwrap();

    let (events_tx, events_rx) = bounded(100);
    let controller = SessionController::new(coordinator.clone(), events_tx.clone());

    let sink = Arc::new(MemorySink::default());
    let alerter = Arc::new(MemoryAlerter::default());
    let aggregator = EventAggregator::new(sink, alerter.clone());

    // Lock/unlock churn...
    controller.handle_session_change(SessionChange::new(SessionState::Locked));
    controller.handle_session_change(SessionChange::new(SessionState::Unlocked));

    // ...followed by input activity within the correlation window.
    let debouncer =
        InputDebouncer::with_sensitivity(events_tx, "input-sensor", Duration::from_secs(30));
    debouncer.record_tick(InputTick::key());
    debouncer.flush();

    drain_into(&events_rx, &aggregator);

    let alerts = alerter.sent();
    assert!(
        alerts.iter().any(|a| a.category == EventCategory::Input),
        "session churn plus input should alert on the input event"
    );
}

#[test]
fn test_failed_logins_raise_alert_without_other_activity() {
    let sink = Arc::new(MemorySink::default());
    let alerter = Arc::new(MemoryAlerter::default());
    let aggregator = EventAggregator::new(sink, alerter.clone());

    for i in 0..3 {
        aggregator.process_event(EventRecord::new(
            EventCategory::Login,
            Severity::Medium,
            format!("Failed login attempt {i} for user admin"),
            "login-sensor",
        ));
    }

    assert!(
        !alerter.sent().is_empty(),
        "three failed logins inside the window should alert"
    );
}

#[test]
fn test_lock_unlock_cycle_keeps_monitoring_consistent() {
    let coordinator = Arc::new(ServiceCoordinator::new());
    coordinator.register(Arc::new(NoopSensor::new("input", ServiceKind::Input)));
    coordinator.register(Arc::new(NoopSensor::new("session", ServiceKind::Session)));
    coordinator.register(Arc::new(NoopSensor::new("login", ServiceKind::Login)));
    coordinator.register(Arc::new(NoopSensor::new("camera", ServiceKind::Camera)));
    coordinator.start_all().unwrap();

    let (events_tx, _events_rx) = bounded(100);
    let controller = SessionController::new(coordinator.clone(), events_tx);
    let status_rx = controller.subscribe();

    controller.handle_session_change(SessionChange::new(SessionState::Locked));
    let locked_status = status_rx.try_recv().unwrap();
    assert_eq!(locked_status.session_state, SessionState::Locked);
    assert_eq!(locked_status.active.get("camera"), Some(&false));
    assert!(locked_status.critical_active);

    controller.handle_session_change(SessionChange::new(SessionState::Unlocked));
    let unlocked_status = status_rx.try_recv().unwrap();
    assert_eq!(unlocked_status.active.get("camera"), Some(&true));
    assert!(unlocked_status.critical_active);

    // Reconciliation on a consistent state changes nothing.
    assert_eq!(controller.ensure_continuous_monitoring(), 0);
}

#[test]
fn test_dropped_critical_service_is_revived_or_reported() {
    let coordinator = Arc::new(ServiceCoordinator::new());
    coordinator.register(Arc::new(NoopSensor::new("input", ServiceKind::Input)));
    coordinator.register(Arc::new(NoopSensor::new("session", ServiceKind::Session)));
    coordinator.register(Arc::new(NoopSensor::new("login", ServiceKind::Login)));
    coordinator.start_all().unwrap();

    let (events_tx, events_rx) = bounded(100);
    let controller = SessionController::new(coordinator.clone(), events_tx);

    // The login sensor dies underneath the agent.
    coordinator.stop_kind(ServiceKind::Login);
    assert!(!coordinator.critical_services_running());

    let revived = controller.ensure_continuous_monitoring();
    assert_eq!(revived, 1);
    assert!(coordinator.critical_services_running());

    // The recovery left an audit trail for the aggregator.
    let events: Vec<EventRecord> = events_rx.try_iter().collect();
    assert!(events
        .iter()
        .any(|e| e.category == EventCategory::System && e.description.contains("login")));
}

#[test]
fn test_start_all_stop_all_with_partial_failure() {
    use deskguard_agent::sensor::{SensorService, ServiceError};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct BrokenSensor {
        running: AtomicBool,
    }

    impl SensorService for BrokenSensor {
        fn name(&self) -> &str {
            "broken-camera"
        }
        fn kind(&self) -> ServiceKind {
            ServiceKind::Camera
        }
        fn start(&self) -> Result<(), ServiceError> {
            Err(ServiceError::Backend("no capture device".into()))
        }
        fn stop(&self) -> Result<(), ServiceError> {
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }
        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
    }

    let coordinator = ServiceCoordinator::new();
    coordinator.register(Arc::new(BrokenSensor {
        running: AtomicBool::new(false),
    }));
    coordinator.register(Arc::new(NoopSensor::new("input", ServiceKind::Input)));
    coordinator.register(Arc::new(NoopSensor::new("session", ServiceKind::Session)));

    let report = coordinator.start_all().unwrap();
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, vec!["broken-camera".to_string()]);

    let report = coordinator.stop_all().unwrap();
    assert_eq!(report.succeeded, 3);

    // Every service ends stopped, including the one whose start failed.
    let status = coordinator.status();
    assert_eq!(status.running, 0);
    assert!(status.services.values().all(|running| !running));
}
