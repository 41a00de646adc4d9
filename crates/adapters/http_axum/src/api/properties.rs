//! JSON REST handlers for properties.
//!
//! Property values travel as single-entry objects, `{"brightness": 25}`,
//! both ways.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Map, Value};

use wothub_domain::error::DispatchError;
use wothub_domain::id::ThingId;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /things/{id}/properties`
pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    Ok(Json(thing.properties()))
}

/// `GET /things/{id}/properties/{name}`
pub async fn get(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    let value = thing.read_property(&name)?;
    let mut body = Map::new();
    body.insert(name, value);
    Ok(Json(body))
}

/// `PUT /things/{id}/properties/{name}`
///
/// The body must carry the new value under the property name; members other
/// than the addressed property are ignored.
pub async fn put(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
    Json(mut request): Json<Map<String, Value>>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    let value = request.remove(&name).ok_or(DispatchError::MissingData)?;
    let stored = thing.write_property(&name, value).await?;
    let mut body = Map::new();
    body.insert(name, stored);
    Ok(Json(body))
}
