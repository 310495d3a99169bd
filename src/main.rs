//! Deskguard Agent CLI
//!
//! Continuous desktop security monitoring.

use clap::{Parser, Subcommand};
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use deskguard_agent::{
    aggregate::{EventAggregator, ProcessOutcome},
    config::Config,
    debounce::InputDebouncer,
    sensor::{NoopSensor, ServiceKind},
    services::ServiceCoordinator,
    session::SessionController,
    sink::{JsonlEventSink, TracingAlertSender},
    telemetry::create_shared_telemetry_with_persistence,
    VERSION,
};

#[cfg(feature = "server")]
use deskguard_agent::server::{run_server, ServerConfig, ServerState};

#[derive(Parser)]
#[command(name = "deskguard")]
#[command(author = "Deskguard")]
#[command(version = VERSION)]
#[command(about = "Continuous desktop security monitoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring
    Start {
        /// Run in foreground (don't daemonize)
        #[arg(long)]
        foreground: bool,

        /// Input debounce sensitivity in seconds (overrides config)
        #[arg(long)]
        sensitivity: Option<u64>,

        /// Enable the HTTP status surface (requires server feature)
        #[arg(long)]
        server: bool,

        /// Status server port (0 for random)
        #[arg(long, default_value = "0")]
        server_port: u16,
    },

    /// Pause monitoring
    Pause,

    /// Resume monitoring
    Resume,

    /// Show current monitoring status
    Status,

    /// Show configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            foreground,
            sensitivity,
            server,
            server_port,
        } => {
            cmd_start(foreground, sensitivity, server, server_port);
        }
        Commands::Pause => {
            cmd_pause();
        }
        Commands::Resume => {
            cmd_resume();
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

#[allow(unused_variables)]
fn cmd_start(_foreground: bool, sensitivity: Option<u64>, enable_server: bool, server_port: u16) {
    println!("Deskguard Agent v{VERSION}");
    println!();

    // Load or create configuration
    let mut config = Config::load().unwrap_or_default();
    if let Some(secs) = sensitivity {
        config.sensitivity = Duration::from_secs(secs);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Starting monitoring...");
    println!("  Debounce sensitivity: {}s", config.sensitivity.as_secs());
    println!("  Event log: {:?}", config.event_log_path());
    println!(
        "  Reconciliation interval: {}s",
        config.reconcile_interval_secs
    );

    #[cfg(not(feature = "server"))]
    if enable_server {
        eprintln!("Warning: --server flag ignored (server feature not enabled at compile time)");
    }

    println!();
    println!("Press Ctrl+C to stop");
    println!();

    // Event pipeline: sensors feed this channel, the loop below drains it.
    let (events_tx, events_rx) = bounded(10_000);

    let sink = Arc::new(JsonlEventSink::new(config.event_log_path()));
    let alerter = Arc::new(TracingAlertSender);
    let aggregator = Arc::new(EventAggregator::new(sink, alerter));

    let telemetry = create_shared_telemetry_with_persistence(config.telemetry_path());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown-host".to_string());
    let debouncer = Arc::new(InputDebouncer::with_sensitivity(
        events_tx.clone(),
        format!("input@{host}"),
        config.sensitivity,
    ));

    // Register sensor services. Concrete capture backends plug in through
    // the SensorService trait; no-op sensors stand in where none is wired.
    let coordinator = Arc::new(ServiceCoordinator::new());
    coordinator.register(Arc::new(NoopSensor::new("input", ServiceKind::Input)));
    coordinator.register(Arc::new(NoopSensor::new("session", ServiceKind::Session)));
    coordinator.register(Arc::new(NoopSensor::new("login", ServiceKind::Login)));
    coordinator.register(Arc::new(NoopSensor::new("camera", ServiceKind::Camera)));

    let controller = Arc::new(SessionController::new(coordinator.clone(), events_tx.clone()));

    if !config.paused {
        match coordinator.start_all() {
            Ok(report) => {
                println!(
                    "Sensor services started: {}/{}",
                    report.succeeded, report.attempted
                );
                for name in &report.failed {
                    eprintln!("Warning: service {name} failed to start");
                }
            }
            Err(e) => {
                eprintln!("Error starting services: {e}");
                std::process::exit(1);
            }
        }
        if !coordinator.critical_services_running() {
            eprintln!("Warning: not all critical services are running");
        }
    }

    // Status server (optional)
    #[cfg(feature = "server")]
    if enable_server {
        let state = Arc::new(ServerState::new(
            aggregator.clone(),
            coordinator.clone(),
            controller.clone(),
        ));
        let server_config = ServerConfig { port: server_port };
        thread::spawn(move || match tokio::runtime::Runtime::new() {
            Ok(runtime) => {
                if let Err(e) = runtime.block_on(run_server(server_config, state)) {
                    tracing::error!("Status server exited: {e}");
                }
            }
            Err(e) => tracing::error!("Could not create server runtime: {e}"),
        });
    }

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc_handler(r);

    // Support pause/resume from another process by polling the config file.
    let mut paused = config.paused;
    let mut last_config_check = std::time::Instant::now();
    let mut last_periodic = std::time::Instant::now();
    let mut last_reconcile = std::time::Instant::now();
    let reconcile_interval = Duration::from_secs(config.reconcile_interval_secs.max(1));

    if paused {
        println!("Monitoring is currently paused.");
        println!("Run `deskguard resume` to start monitoring.");
        println!();
    }

    // Main event loop
    while running.load(Ordering::SeqCst) {
        // Reload config periodically so `deskguard pause/resume` can control
        // a running agent.
        if last_config_check.elapsed() >= Duration::from_secs(1) {
            if let Ok(cfg) = Config::load() {
                if cfg.paused != paused {
                    paused = cfg.paused;

                    if paused {
                        println!();
                        println!("Pausing monitoring...");
                        debouncer.flush();
                        if let Err(e) = coordinator.stop_all() {
                            eprintln!("Warning: could not stop services: {e}");
                        }
                    } else {
                        println!();
                        println!("Resuming monitoring...");
                        if let Err(e) = coordinator.start_all() {
                            eprintln!("Warning: could not start services: {e}");
                        }
                    }
                }
                if cfg.sensitivity != config.sensitivity {
                    config.sensitivity = cfg.sensitivity;
                    debouncer.set_sensitivity(cfg.sensitivity);
                }
            }
            last_config_check = std::time::Instant::now();
        }

        if paused {
            // Drain and drop queued events while paused.
            while events_rx.try_recv().is_ok() {}
            thread::sleep(Duration::from_millis(100));
            continue;
        }

        // Process events with timeout
        match events_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(record) => {
                telemetry.record_event_ingested();
                match aggregator.process_event(record) {
                    ProcessOutcome::Processed { alerted } => {
                        telemetry.record_event_persisted();
                        if alerted {
                            telemetry.record_alert_sent();
                        }
                    }
                    ProcessOutcome::Suppressed => telemetry.record_event_suppressed(),
                    ProcessOutcome::Rejected => {}
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                eprintln!("Event channel disconnected unexpectedly");
                break;
            }
        }

        // Periodic debounce flush check
        if last_periodic.elapsed() >= Duration::from_secs(1) {
            debouncer.check_elapsed();
            last_periodic = std::time::Instant::now();
        }

        // Periodic reconciliation of the sensor services
        if last_reconcile.elapsed() >= reconcile_interval {
            let revived = controller.ensure_continuous_monitoring();
            if revived > 0 {
                println!("Recovered {revived} critical service(s)");
            }
            last_reconcile = std::time::Instant::now();
        }
    }

    // Stop monitoring
    println!();
    println!("Stopping monitoring...");

    // Flush pending input counters, then drain what the flush produced.
    debouncer.flush();
    while let Ok(record) = events_rx.try_recv() {
        telemetry.record_event_ingested();
        match aggregator.process_event(record) {
            ProcessOutcome::Processed { alerted } => {
                telemetry.record_event_persisted();
                if alerted {
                    telemetry.record_alert_sent();
                }
            }
            ProcessOutcome::Suppressed => telemetry.record_event_suppressed(),
            ProcessOutcome::Rejected => {}
        }
    }

    if let Err(e) = coordinator.stop_all() {
        eprintln!("Warning: could not stop services cleanly: {e}");
    }

    if let Err(e) = telemetry.save() {
        eprintln!("Warning: Could not save telemetry: {e}");
    }

    // Final stats
    println!();
    println!("{}", telemetry.summary());
}

fn cmd_pause() {
    let mut config = Config::load().unwrap_or_default();
    config.paused = true;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Monitoring paused. Use 'deskguard resume' to continue.");
}

fn cmd_resume() {
    let mut config = Config::load().unwrap_or_default();
    config.paused = false;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Monitoring resumed.");
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Deskguard Agent Status");
    println!("======================");
    println!();

    println!("Configuration:");
    println!("  Debounce sensitivity: {}s", config.sensitivity.as_secs());
    println!("  Event log: {:?}", config.event_log_path());
    println!("  Paused: {}", config.paused);
    println!();

    // Load and show cumulative telemetry if available
    let telemetry_path = config.telemetry_path();
    if telemetry_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&telemetry_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                if let Some(ingested) = stats.get("events_ingested") {
                    println!("  Events ingested: {ingested}");
                }
                if let Some(persisted) = stats.get("events_persisted") {
                    println!("  Events persisted: {persisted}");
                }
                if let Some(suppressed) = stats.get("events_suppressed") {
                    println!("  Duplicates suppressed: {suppressed}");
                }
                if let Some(alerts) = stats.get("alerts_sent") {
                    println!("  Alerts sent: {alerts}");
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");
}
