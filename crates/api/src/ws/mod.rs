//! WebSocket transport: the broker and the HTTP upgrade handler.

pub mod broker;
mod handler;

use axum::routing::get;
use axum::Router;

pub use broker::{Broker, PeerRole};
pub use handler::ws_handler;

use crate::state::AppState;

/// Routes served on the WebSocket port.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
}
