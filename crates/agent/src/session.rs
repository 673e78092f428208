//! Relay connection and event streaming loop.
//!
//! Connects to the relay, performs the host handshake (`STATUS:connected`
//! followed by the current `UI_CONFIG`), then dispatches every inbound
//! envelope through the [`TaskDispatcher`] while forwarding published
//! events to the relay. Reconnects with a fixed delay when the socket drops.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use relaydeck_core::{Envelope, HostStatus};
use relaydeck_worker::TaskDispatcher;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The relay closed the socket or it failed; reconnect.
    Dropped,
    Cancelled,
    /// Every publisher is gone; nothing left to stream.
    OutboxClosed,
}

/// Host-side client of a relay.
pub struct Agent {
    url: String,
    dispatcher: Arc<TaskDispatcher>,
    outbox: mpsc::UnboundedReceiver<Envelope>,
    reconnect_delay: Duration,
}

impl Agent {
    pub fn new(
        url: impl Into<String>,
        dispatcher: Arc<TaskDispatcher>,
        outbox: mpsc::UnboundedReceiver<Envelope>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            dispatcher,
            outbox,
            reconnect_delay,
        }
    }

    /// Run sessions until `cancel` fires or the outbox closes.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tracing::info!(url = %self.url, "Connecting to relay");

            let connected = tokio::select! {
                _ = cancel.cancelled() => return,
                connected = connect_async(self.url.as_str()) => connected,
            };

            let end = match connected {
                Ok((socket, _response)) => {
                    tracing::info!("Relay connected");
                    self.session(socket, &cancel).await
                }
                Err(e) => {
                    tracing::error!(error = %e, "Relay connection failed");
                    SessionEnd::Dropped
                }
            };

            match end {
                SessionEnd::Dropped => {
                    tracing::warn!(
                        delay_secs = self.reconnect_delay.as_secs(),
                        "Relay session ended, reconnecting"
                    );
                }
                SessionEnd::Cancelled => {
                    tracing::info!("Relay session cancelled");
                    return;
                }
                SessionEnd::OutboxClosed => {
                    tracing::info!("Event channel closed, leaving relay");
                    return;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    /// Drive one connected session.
    async fn session(&mut self, socket: RelaySocket, cancel: &CancellationToken) -> SessionEnd {
        let discarded = self.discard_stale();
        if discarded > 0 {
            tracing::debug!(discarded, "Dropped events queued while offline");
        }

        let (mut sink, mut stream) = socket.split();

        let ui = self.dispatcher.registry().ui_config().await;
        for envelope in [Envelope::Status(HostStatus::Connected), Envelope::UiConfig(ui)] {
            if let Err(e) = send_envelope(&mut sink, &envelope).await {
                tracing::error!(error = %e, "Host handshake failed");
                return SessionEnd::Dropped;
            }
        }
        tracing::info!("Host handshake sent");

        let dispatcher = Arc::clone(&self.dispatcher);
        let outbox = &mut self.outbox;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Cancelled;
                }
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => handle_inbound(&dispatcher, &text).await,
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Relay closed WebSocket");
                        return SessionEnd::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "WebSocket receive error");
                        return SessionEnd::Dropped;
                    }
                    None => {
                        tracing::info!("WebSocket stream exhausted");
                        return SessionEnd::Dropped;
                    }
                },
                event = outbox.recv() => match event {
                    Some(envelope) => {
                        if let Err(e) = send_envelope(&mut sink, &envelope).await {
                            tracing::error!(error = %e, tag = %envelope.tag(), "Failed to send event");
                            return SessionEnd::Dropped;
                        }
                    }
                    None => return SessionEnd::OutboxClosed,
                },
            }
        }
    }

    /// Drop everything published while no relay was connected.
    fn discard_stale(&mut self) -> usize {
        let mut count = 0;
        while self.outbox.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

/// Parse a relay frame and apply it. Frames this host does not understand
/// are ignored.
async fn handle_inbound(dispatcher: &TaskDispatcher, text: &str) {
    match Envelope::parse(text) {
        Ok(envelope) => dispatcher.dispatch(envelope).await,
        Err(e) => tracing::debug!(error = %e, "Ignoring relay frame"),
    }
}

/// Serialize an envelope and send it as a text frame.
async fn send_envelope<S>(sink: &mut S, envelope: &Envelope) -> Result<(), tungstenite::Error>
where
    S: SinkExt<Message, Error = tungstenite::Error> + Unpin,
{
    match envelope.to_json() {
        Ok(text) => sink.send(Message::Text(text)).await,
        Err(e) => {
            tracing::error!(tag = %envelope.tag(), error = %e, "Failed to encode envelope");
            Ok(())
        }
    }
}
