use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// `embedded` or `relay`.
    pub mode: &'static str,
    pub connections: usize,
    pub host_connected: bool,
    /// Live job instances (embedded mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_jobs: Option<Vec<String>>,
}

/// GET /health -- returns service status and broker counters.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_jobs = match &state.registry {
        Some(registry) => Some(registry.active_jobs().await),
        None => None,
    };

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mode: state.broker.mode().as_str(),
        connections: state.broker.connection_count().await,
        host_connected: state.broker.host_id().await.is_some(),
        active_jobs,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
