//! Process wiring shared by the binary and the integration tests.
//!
//! [`assemble`] builds the broker for the configured transport mode (plus
//! registry, dispatcher and outbox pump in embedded mode); [`ws_app`] and
//! [`http_app`] build the two routers.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use relaydeck_core::{HostCapabilities, Publisher};
use relaydeck_worker::{DirectorySource, ExitHandler, JobRegistry, TaskDispatcher};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::{ServerConfig, TransportMode};
use crate::error::ServeError;
use crate::routes;
use crate::state::AppState;
use crate::ws::{self, Broker};

/// Everything a running server owns besides its listeners.
pub struct Deck {
    pub state: AppState,
    /// Event sink for host-side producers (embedded mode).
    pub publisher: Option<Publisher>,
    outbox: Option<JoinHandle<()>>,
}

impl Deck {
    /// Stop every job (bounded), then close every connection.
    pub async fn shutdown(self) {
        if let Some(registry) = &self.state.registry {
            let stopped = registry.stop_all().await;
            tracing::info!(stopped, "Jobs stopped");
        }

        let count = self.state.broker.connection_count().await;
        tracing::info!(count, "Closing remaining WebSocket connections");
        self.state.broker.shutdown_all().await;

        if let Some(outbox) = self.outbox {
            outbox.abort();
        }
    }
}

/// Build the broker and its collaborators for `config.mode`.
///
/// In embedded mode this scans `config.jobs_dir` and spawns the task that
/// forwards published events to the broker, so it must run inside a Tokio
/// runtime.
pub async fn assemble(
    config: ServerConfig,
    host: Arc<dyn HostCapabilities>,
    exit: Arc<dyn ExitHandler>,
) -> Deck {
    let config = Arc::new(config);

    match config.mode {
        TransportMode::Embedded => {
            let (publisher, outbox_rx) = Publisher::channel();
            let source = Arc::new(DirectorySource::new(config.jobs_dir.clone()));
            let registry = Arc::new(JobRegistry::new(
                source,
                Arc::clone(&host),
                publisher.clone(),
            ));
            registry.discover().await;

            let dispatcher = Arc::new(TaskDispatcher::new(
                Arc::clone(&registry),
                host,
                publisher.clone(),
                exit,
            ));
            let broker = Arc::new(Broker::embedded(dispatcher));
            let outbox = tokio::spawn(Arc::clone(&broker).run_outbox(outbox_rx));

            Deck {
                state: AppState {
                    config,
                    broker,
                    registry: Some(registry),
                },
                publisher: Some(publisher),
                outbox: Some(outbox),
            }
        }
        TransportMode::Relay => Deck {
            state: AppState {
                config,
                broker: Arc::new(Broker::relay()),
                registry: None,
            },
            publisher: None,
            outbox: None,
        },
    }
}

/// Router for the WebSocket port.
pub fn ws_app(state: AppState) -> Router {
    ws::router().with_state(state)
}

/// Router for the HTTP port.
///
/// The middleware stack is applied bottom-up: tracing, then panic recovery.
pub fn http_app(state: AppState) -> Router {
    routes::http_routes(&state)
        // Panic recovery: catch panics and return 500.
        .layer(CatchPanicLayer::new())
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Bind a listener on `host:port`.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, ServeError> {
    let ip: IpAddr = host
        .parse()
        .map_err(|_| ServeError::Address(host.to_string()))?;
    let addr = SocketAddr::new(ip, port);

    TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })
}
