//! `relaydeck-agent` -- scripting-host daemon for the relay variant.
//!
//! Discovers job scripts, connects to a relay as the host, runs jobs on
//! request and streams logs, chat echoes and inventory back to the relay.
//! See [`AgentConfig::from_env`] for the environment variables.

use std::sync::Arc;
use std::time::Duration;

use relaydeck_agent::config::AgentConfig;
use relaydeck_agent::session::Agent;
use relaydeck_core::{ConsoleHost, HostCapabilities, Publisher};
use relaydeck_worker::{inventory, DirectorySource, JobRegistry, ProcessExit, TaskDispatcher};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relaydeck_agent=info,relaydeck_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        relay_url = %config.relay_url,
        jobs_dir = %config.jobs_dir.display(),
        "Starting relaydeck-agent",
    );

    let host: Arc<dyn HostCapabilities> = Arc::new(ConsoleHost);
    let (publisher, outbox) = Publisher::channel();

    let registry = Arc::new(JobRegistry::new(
        Arc::new(DirectorySource::new(config.jobs_dir.clone())),
        Arc::clone(&host),
        publisher.clone(),
    ));
    registry.discover().await;

    let dispatcher = Arc::new(TaskDispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&host),
        publisher.clone(),
        Arc::new(ProcessExit),
    ));

    let cancel = CancellationToken::new();

    let inventory_handle = tokio::spawn(inventory::run(
        host,
        publisher,
        config.inventory_interval,
        cancel.clone(),
    ));

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received SIGINT (Ctrl-C), shutting down"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install Ctrl-C handler");
                return;
            }
        }
        signal_cancel.cancel();
    });

    Agent::new(config.relay_url, dispatcher, outbox, config.reconnect_delay)
        .run(cancel.clone())
        .await;

    cancel.cancel();
    registry.stop_all().await;
    let _ = tokio::time::timeout(Duration::from_secs(5), inventory_handle).await;
    tracing::info!("Agent stopped");
}
