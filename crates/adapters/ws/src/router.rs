//! WebSocket route assembly.

use std::sync::Arc;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use wothub_app::registry::ThingRegistry;
use wothub_domain::id::ThingId;

use crate::connection;

/// Build the `/things/{id}/ws` router. Meant to be merged into the HTTP
/// router so both surfaces share one listener.
pub fn routes(registry: Arc<ThingRegistry>) -> Router {
    Router::new()
        .route("/things/{id}/ws", get(upgrade))
        .with_state(registry)
}

/// `GET /things/{id}/ws`
///
/// Refuses the upgrade with a `404` when the thing does not exist, so a
/// client learns about a bad id during the handshake instead of through a
/// silently dead socket.
async fn upgrade(
    State(registry): State<Arc<ThingRegistry>>,
    Path(id): Path<String>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let thing_id = ThingId::from(id);
    if !registry.contains(&thing_id) {
        return (
            StatusCode::NOT_FOUND,
            format!("thing `{thing_id}` not found"),
        )
            .into_response();
    }
    upgrade.on_upgrade(move |socket| connection::run(socket, registry, thing_id))
}
