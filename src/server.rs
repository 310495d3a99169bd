//! HTTP status surface for UI/tray observers.
//!
//! Exposes the agent's read-only snapshots over loopback HTTP so a tray
//! application or dashboard can poll monitoring health without linking
//! against the agent:
//!
//! - `GET /health`  - liveness and version
//! - `GET /status`  - monitoring posture and per-service state
//! - `GET /stats`   - aggregator statistics

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::aggregate::{AggregatorStats, EventAggregator};
use crate::services::ServiceCoordinator;
use crate::session::SessionController;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 0 }
    }
}

/// Shared server state
pub struct ServerState {
    aggregator: Arc<EventAggregator>,
    coordinator: Arc<ServiceCoordinator>,
    controller: Arc<SessionController>,
}

impl ServerState {
    pub fn new(
        aggregator: Arc<EventAggregator>,
        coordinator: Arc<ServiceCoordinator>,
        controller: Arc<SessionController>,
    ) -> Self {
        Self {
            aggregator,
            coordinator,
            controller,
        }
    }
}

/// Run the status server until the process exits.
///
/// Binds to loopback only; the surface is read-only but still local-machine
/// information.
pub async fn run_server(config: ServerConfig, state: Arc<ServerState>) -> anyhow::Result<()> {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/stats", get(stats))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;
    tracing::info!("Status server listening on http://{}", actual_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

async fn status(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    Json(json!({
        "monitoring": state.controller.monitoring_status(),
        "services": state.coordinator.status(),
    }))
}

async fn stats(State(state): State<Arc<ServerState>>) -> Json<AggregatorStats> {
    Json(state.aggregator.stats())
}
