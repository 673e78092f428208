//! Control surface: `index.html` with the socket address injected.

use std::io::ErrorKind;
use std::sync::LazyLock;

use axum::extract::State;
use axum::response::Html;
use axum::{routing::get, Router};
use regex::{NoExpand, Regex};

use crate::error::AppResult;
use crate::state::AppState;

/// Served when `UI_DIR/index.html` is absent.
const BUNDLED_INDEX: &str = include_str!("../../assets/index.html");

/// Placeholder for the WebSocket port in the bundled page.
const PORT_PLACEHOLDER: &str = "__PORT__";

static WS_CONSTRUCTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"new WebSocket\(\s*['"][^'"]*['"]\s*\)"#).expect("valid regex")
});

/// Point every `new WebSocket('...')` in `html` at `port` on the page's own host.
pub fn inject_ws_port(html: &str, port: u16) -> String {
    let target = format!("new WebSocket('ws://' + window.location.hostname + ':{port}')");
    WS_CONSTRUCTOR
        .replace_all(html, NoExpand(&target))
        .into_owned()
}

/// The bundled page with its port placeholder filled in.
pub fn bundled_index(port: u16) -> String {
    BUNDLED_INDEX.replace(PORT_PLACEHOLDER, &port.to_string())
}

/// GET / and /index.html
async fn index(State(state): State<AppState>) -> AppResult<Html<String>> {
    let port = state.config.ws_port;
    let path = state.config.ui_dir.join("index.html");

    let html = match tokio::fs::read_to_string(&path).await {
        Ok(html) => inject_ws_port(&html, port),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No custom UI, serving bundled page");
            bundled_index(port)
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Html(html))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/index.html", get(index))
}
