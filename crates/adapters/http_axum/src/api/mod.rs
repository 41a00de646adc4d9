//! JSON REST handler modules for the thing surface.

#[allow(clippy::missing_errors_doc)]
pub mod actions;
#[allow(clippy::missing_errors_doc)]
pub mod events;
#[allow(clippy::missing_errors_doc)]
pub mod properties;
#[allow(clippy::missing_errors_doc)]
pub mod things;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

/// Build the `/things` sub-router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(things::list))
        .route("/{id}", get(things::get))
        .route("/{id}/properties", get(properties::list))
        .route(
            "/{id}/properties/{name}",
            get(properties::get).put(properties::put),
        )
        .route("/{id}/actions", get(actions::list).post(actions::request))
        .route(
            "/{id}/actions/{name}",
            get(actions::list_of).post(actions::request_named),
        )
        .route(
            "/{id}/actions/{name}/{action_id}",
            get(actions::get).delete(actions::delete),
        )
        .route("/{id}/events", get(events::list))
        .route("/{id}/events/{name}", get(events::list_of))
}
