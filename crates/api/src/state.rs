use std::sync::Arc;

use relaydeck_worker::JobRegistry;

use crate::config::ServerConfig;
use crate::ws::Broker;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub broker: Arc<Broker>,
    /// Present in embedded mode only.
    pub registry: Option<Arc<JobRegistry>>,
}
