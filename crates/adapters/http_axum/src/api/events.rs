//! JSON REST handlers for the event log.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::Value;

use wothub_domain::event::EventRecord;
use wothub_domain::id::ThingId;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /things/{id}/events`
pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    let records = thing
        .all_events()
        .iter()
        .map(EventRecord::as_description)
        .collect();
    Ok(Json(records))
}

/// `GET /things/{id}/events/{name}`
pub async fn list_of(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    let records = thing
        .events_of(&name)?
        .iter()
        .map(EventRecord::as_description)
        .collect();
    Ok(Json(records))
}
