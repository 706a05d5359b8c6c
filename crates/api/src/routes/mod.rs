pub mod analyses;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /analyses                  list, create
/// /analyses/{id}             get, update, delete
/// /analyses/{id}/run         start a pending analysis
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/analyses", analyses::router())
}

/// WebSocket routes, mounted at the root.
///
/// ```text
/// /ws/{analysis_id}          live updates for one analysis
/// ```
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws/{analysis_id}", get(ws::ws_handler))
}
