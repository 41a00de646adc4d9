//! JSON REST handlers for thing descriptions.

use axum::Json;
use axum::extract::{Path, State};

use wothub_domain::description::ThingDescription;
use wothub_domain::id::ThingId;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /things`
pub async fn list(State(state): State<AppState>) -> Json<Vec<ThingDescription>> {
    let descriptions = state
        .registry
        .things()
        .iter()
        .map(|thing| thing.description())
        .collect();
    Json(descriptions)
}

/// `GET /things/{id}`
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ThingDescription>, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    Ok(Json(thing.description()))
}
