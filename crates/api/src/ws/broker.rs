//! Message Broker: the live connection set and envelope fan-out.
//!
//! In embedded mode the broker runs next to the job registry: inbound
//! envelopes go straight to the [`TaskDispatcher`] and every peer is an
//! observer. In relay mode the broker interprets nothing but the host
//! handshake and forwards every other frame to the other peers, so the
//! scripting host is just another connection.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes};
use relaydeck_core::types::{ConnId, Timestamp};
use relaydeck_core::{Envelope, HostStatus, RawFrame, Tag, UiConfig};
use relaydeck_worker::TaskDispatcher;
use tokio::sync::{mpsc, RwLock};

use crate::config::TransportMode;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// How the broker currently classifies a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// Relay peer that has not sent anything meaningful yet.
    Unknown,
    Observer,
    /// The scripting host; at most one at a time.
    Host,
}

/// Metadata for a single WebSocket connection.
struct Connection {
    role: PeerRole,
    /// Channel sender for outbound messages to this connection.
    sender: WsSender,
    connected_at: Timestamp,
}

#[derive(Default)]
struct BrokerState {
    connections: HashMap<ConnId, Connection>,
    host: Option<ConnId>,
    /// Last `UI_CONFIG` the host published (relay mode).
    ui_snapshot: Option<UiConfig>,
}

/// Manages all live connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the socket handlers and the outbox pump. Socket writes
/// never happen while the lock is held.
pub struct Broker {
    mode: TransportMode,
    state: RwLock<BrokerState>,
    dispatcher: Option<Arc<TaskDispatcher>>,
}

impl Broker {
    /// Broker for the embedded variant, dispatching inbound envelopes.
    pub fn embedded(dispatcher: Arc<TaskDispatcher>) -> Self {
        Self {
            mode: TransportMode::Embedded,
            state: RwLock::new(BrokerState::default()),
            dispatcher: Some(dispatcher),
        }
    }

    /// Broker for the standalone relay variant.
    pub fn relay() -> Self {
        Self {
            mode: TransportMode::Relay,
            state: RwLock::new(BrokerState::default()),
            dispatcher: None,
        }
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// Register a new connection and queue its greeting.
    ///
    /// The greeting is a `STATUS` frame reflecting host presence followed by
    /// the current `UI_CONFIG`, when one is known. Returns the receiver half
    /// of the message channel so the caller can forward messages to the
    /// WebSocket sink.
    pub async fn accept(&self, conn_id: ConnId) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();

        let embedded_ui = match &self.dispatcher {
            Some(dispatcher) => Some(dispatcher.registry().ui_config().await),
            None => None,
        };

        let mut state = self.state.write().await;
        let (status, ui, role) = match self.mode {
            TransportMode::Embedded => (HostStatus::Connected, embedded_ui, PeerRole::Observer),
            TransportMode::Relay => {
                let status = if state.host.is_some() {
                    HostStatus::Connected
                } else {
                    HostStatus::Disconnected
                };
                (status, state.ui_snapshot.clone(), PeerRole::Unknown)
            }
        };

        // Queued before the insert so no broadcast can overtake the greeting.
        send_envelope(&tx, &Envelope::Status(status));
        if let Some(ui) = ui {
            send_envelope(&tx, &Envelope::UiConfig(ui));
        }

        state.connections.insert(
            conn_id.clone(),
            Connection {
                role,
                sender: tx,
                connected_at: chrono::Utc::now(),
            },
        );
        tracing::debug!(conn_id = %conn_id, ?role, "Connection registered");
        rx
    }

    /// Handle one inbound text frame.
    ///
    /// Malformed frames are dropped without touching the connection.
    pub async fn on_message(&self, conn_id: &str, text: &str) {
        let raw = match RawFrame::parse(text) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "Dropping malformed frame");
                return;
            }
        };

        match &self.dispatcher {
            Some(dispatcher) => match Envelope::from_raw(raw) {
                Ok(envelope) => dispatcher.dispatch(envelope).await,
                Err(e) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Dropping undecodable frame");
                }
            },
            None => self.forward(conn_id, text, raw).await,
        }
    }

    /// Relay mode: handle the host handshake, pass everything else on.
    async fn forward(&self, conn_id: &str, text: &str, raw: RawFrame) {
        let tag = raw.known_tag();
        let envelope = tag.and_then(|_| Envelope::from_raw(raw).ok());

        if envelope.as_ref().is_some_and(Envelope::is_host_handshake) {
            self.promote(conn_id).await;
            self.fan_out(Utf8Bytes::from(text), Some(conn_id)).await;
            return;
        }

        let from_host = {
            let mut state = self.state.write().await;
            let from_host = state.host.as_deref() == Some(conn_id);
            if let Some(conn) = state.connections.get_mut(conn_id) {
                if conn.role == PeerRole::Unknown {
                    conn.role = PeerRole::Observer;
                }
            }
            if from_host {
                if let Some(Envelope::UiConfig(config)) = &envelope {
                    state.ui_snapshot = Some(config.clone());
                }
            }
            from_host
        };

        // Chat-visible tags are reflected to the sender; control tags and
        // unknown tags only reach the other peers.
        let echo = tag.is_some_and(Tag::echoes_to_sender);
        let skip = if echo { None } else { Some(conn_id) };
        tracing::trace!(conn_id = %conn_id, from_host, echo, "Relaying frame");
        self.fan_out(Utf8Bytes::from(text), skip).await;
    }

    /// Make `conn_id` the host, demoting any previous host.
    async fn promote(&self, conn_id: &str) {
        let mut state = self.state.write().await;
        if !state.connections.contains_key(conn_id) {
            return;
        }

        let previous = state.host.replace(conn_id.to_string());
        if let Some(previous) = previous.filter(|p| p != conn_id) {
            if let Some(old) = state.connections.get_mut(&previous) {
                old.role = PeerRole::Observer;
            }
            tracing::info!(conn_id = %conn_id, previous = %previous, "Host replaced");
        } else {
            tracing::info!(conn_id = %conn_id, "Host connected");
        }

        if let Some(conn) = state.connections.get_mut(conn_id) {
            conn.role = PeerRole::Host;
        }
    }

    /// Remove a connection; if it was the host, tell everyone else.
    pub async fn on_close(&self, conn_id: &str) {
        self.forget(&[conn_id.to_string()]).await;
    }

    /// Serialize `envelope` once and send it to every live connection.
    pub async fn publish(&self, envelope: &Envelope) {
        match envelope.to_json() {
            Ok(text) => self.fan_out(Utf8Bytes::from(text), None).await,
            Err(e) => {
                tracing::error!(tag = %envelope.tag(), error = %e, "Failed to encode envelope");
            }
        }
    }

    /// Publish every envelope from `rx` until the channel closes.
    pub async fn run_outbox(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(envelope) = rx.recv().await {
            self.publish(&envelope).await;
        }
        tracing::debug!("Outbox closed");
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    pub async fn host_id(&self) -> Option<ConnId> {
        self.state.read().await.host.clone()
    }

    pub async fn role(&self, conn_id: &str) -> Option<PeerRole> {
        self.state
            .read()
            .await
            .connections
            .get(conn_id)
            .map(|conn| conn.role)
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut state = self.state.write().await;
        let count = state.connections.len();
        for (conn_id, conn) in state.connections.iter() {
            let age = chrono::Utc::now() - conn.connected_at;
            tracing::debug!(conn_id = %conn_id, age_secs = age.num_seconds(), "Closing connection");
            let _ = conn.sender.send(Message::Close(None));
        }
        state.connections.clear();
        state.host = None;
        state.ui_snapshot = None;
        tracing::info!(count, "Closed all WebSocket connections");
    }

    // ---- private helpers ----

    /// Send `frame` to every connection except `skip`; a failed send counts
    /// as an implicit close.
    async fn fan_out(&self, frame: Utf8Bytes, skip: Option<&str>) {
        let dead = self.deliver(frame, skip).await;
        self.forget(&dead).await;
    }

    /// Returns the connections whose channel is gone.
    async fn deliver(&self, frame: Utf8Bytes, skip: Option<&str>) -> Vec<ConnId> {
        let targets: Vec<(ConnId, WsSender)> = {
            let state = self.state.read().await;
            state
                .connections
                .iter()
                .filter(|(id, _)| Some(id.as_str()) != skip)
                .map(|(id, conn)| (id.clone(), conn.sender.clone()))
                .collect()
        };

        targets
            .into_iter()
            .filter_map(|(id, sender)| {
                sender
                    .send(Message::Text(frame.clone()))
                    .is_err()
                    .then_some(id)
            })
            .collect()
    }

    /// Drop `ids` from the live set. If the host was among them, the
    /// disconnect notice is queued to the remaining peers before the lock
    /// is released.
    async fn forget(&self, ids: &[ConnId]) {
        if ids.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        let mut host_lost = false;
        for id in ids {
            if state.connections.remove(id).is_some() {
                tracing::debug!(conn_id = %id, "Connection removed");
            }
            if state.host.as_deref() == Some(id.as_str()) {
                state.host = None;
                state.ui_snapshot = None;
                host_lost = true;
            }
        }
        if host_lost {
            announce_host_lost(&mut state);
        }
    }
}

/// Queue `STATUS: disconnected` to every connection in `state`, dropping
/// those whose channel is gone.
fn announce_host_lost(state: &mut BrokerState) {
    tracing::info!("Host disconnected");
    let text = match Envelope::Status(HostStatus::Disconnected).to_json() {
        Ok(text) => Utf8Bytes::from(text),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode host status");
            return;
        }
    };
    state.connections.retain(|conn_id, conn| {
        let alive = conn.sender.send(Message::Text(text.clone())).is_ok();
        if !alive {
            tracing::debug!(conn_id = %conn_id, "Connection removed");
        }
        alive
    });
}

fn send_envelope(tx: &WsSender, envelope: &Envelope) {
    match envelope.to_json() {
        Ok(text) => {
            let _ = tx.send(Message::Text(text.into()));
        }
        Err(e) => tracing::error!(tag = %envelope.tag(), error = %e, "Failed to encode envelope"),
    }
}
