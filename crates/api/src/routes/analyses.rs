use axum::routing::{get, post};
use axum::Router;

use crate::handlers::analyses;
use crate::state::AppState;

/// Routes mounted at `/analyses`.
///
/// ```text
/// GET    /            -> list
/// POST   /            -> create (starts the run)
/// GET    /{id}        -> get_by_id
/// PUT    /{id}        -> update
/// DELETE /{id}        -> delete
/// POST   /{id}/run    -> start_run
/// GET    /{id}/report -> report
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(analyses::list).post(analyses::create))
        .route(
            "/{id}",
            get(analyses::get_by_id)
                .put(analyses::update)
                .delete(analyses::delete),
        )
        .route("/{id}/run", post(analyses::start_run))
        .route("/{id}/report", get(analyses::report))
}
