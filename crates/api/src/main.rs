use std::sync::Arc;
use std::time::Duration;

use relaydeck_core::{ConsoleHost, HostCapabilities};
use relaydeck_worker::{inventory, ProcessExit};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relaydeck_api::config::{ServerConfig, TransportMode};
use relaydeck_api::{browser, server};

/// How long each listener gets to drain after shutdown begins.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relaydeck_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(
        mode = %config.mode,
        host = %config.host,
        ws_port = config.ws_port,
        http_port = config.http_port,
        "Loaded server configuration"
    );

    // --- Listeners ---
    let ws_listener = match server::bind(&config.host, config.ws_port).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind WebSocket port");
            std::process::exit(1);
        }
    };
    let http_listener = match server::bind(&config.host, config.http_port).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind HTTP port");
            std::process::exit(1);
        }
    };

    // --- Broker and jobs ---
    let host: Arc<dyn HostCapabilities> = Arc::new(ConsoleHost);
    let deck = server::assemble(config.clone(), Arc::clone(&host), Arc::new(ProcessExit)).await;
    let cancel = CancellationToken::new();

    // --- Inventory poller (embedded only) ---
    let inventory_handle = deck.publisher.clone().map(|publisher| {
        tokio::spawn(inventory::run(
            Arc::clone(&host),
            publisher,
            config.inventory_interval,
            cancel.clone(),
        ))
    });

    // --- Browser auto-open ---
    if config.mode == TransportMode::Embedded && config.auto_open {
        let url = format!("http://localhost:{}", config.http_port);
        tokio::spawn(browser::open_after(url, browser::OPEN_DELAY));
    }

    // --- Servers ---
    let ws_handle = spawn_server("ws", ws_listener, server::ws_app(deck.state.clone()), &cancel);
    let http_handle = spawn_server(
        "http",
        http_listener,
        server::http_app(deck.state.clone()),
        &cancel,
    );
    tracing::info!(
        ws = %format!("{}:{}", config.host, config.ws_port),
        http = %format!("{}:{}", config.host, config.http_port),
        "Servers started"
    );

    tokio::select! {
        () = shutdown_signal() => {}
        () = cancel.cancelled() => {
            tracing::error!("A listener stopped unexpectedly, shutting down");
        }
    }

    // --- Post-shutdown cleanup ---
    cancel.cancel();
    deck.shutdown().await;

    let _ = tokio::time::timeout(DRAIN_TIMEOUT, ws_handle).await;
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, http_handle).await;
    if let Some(handle) = inventory_handle {
        let _ = tokio::time::timeout(DRAIN_TIMEOUT, handle).await;
    }

    tracing::info!("Graceful shutdown complete");
}

/// Serve `app` until `cancel` fires. A serve error cancels the token so the
/// rest of the process shuts down too.
fn spawn_server(
    name: &'static str,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel: &CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        let graceful = cancel.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!(server = name, error = %e, "Server error");
        }
        cancel.cancel();
        tracing::info!(server = name, "Listener closed");
    })
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
