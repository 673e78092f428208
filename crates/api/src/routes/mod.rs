pub mod health;
pub mod ui;

use axum::Router;
use tower_http::services::ServeDir;

use crate::state::AppState;

/// Routes served on the HTTP port.
///
/// Anything not matched by health or the index handler is looked up in
/// `UI_DIR`.
pub fn http_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(ui::router())
        .fallback_service(ServeDir::new(&state.config.ui_dir))
}
