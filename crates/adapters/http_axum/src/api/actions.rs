//! JSON REST handlers for the action queue.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

use wothub_domain::error::{DispatchError, NotFoundError};
use wothub_domain::id::{ActionId, ThingId};

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the request endpoints.
pub enum RequestResponse {
    Created(Json<Value>),
}

impl IntoResponse for RequestResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /things/{id}/actions`
pub async fn list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    let href = thing.href();
    let descriptions = thing
        .all_actions()
        .iter()
        .map(|record| record.as_description(&href))
        .collect();
    Ok(Json(descriptions))
}

/// `POST /things/{id}/actions`
///
/// The body requests exactly one action, `{"fade": {"input": {...}}}`.
pub async fn request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<Map<String, Value>>,
) -> Result<RequestResponse, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    let mut entries = request.into_iter();
    let Some((name, entry)) = entries.next() else {
        return Err(DispatchError::NotSingleMember.into());
    };
    if entries.next().is_some() {
        return Err(DispatchError::NotSingleMember.into());
    }
    let record = thing.perform_action(&name, entry.get("input").cloned())?;
    Ok(RequestResponse::Created(Json(
        record.as_description(&thing.href()),
    )))
}

/// `GET /things/{id}/actions/{name}`
pub async fn list_of(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    let href = thing.href();
    let descriptions = thing
        .actions_of(&name)?
        .iter()
        .map(|record| record.as_description(&href))
        .collect();
    Ok(Json(descriptions))
}

/// `POST /things/{id}/actions/{name}`
///
/// Same body shape as the unnamed variant; the single member must match the
/// action in the path.
pub async fn request_named(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
    Json(mut request): Json<Map<String, Value>>,
) -> Result<RequestResponse, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    let entry = request.remove(&name).ok_or(DispatchError::MissingData)?;
    let record = thing.perform_action(&name, entry.get("input").cloned())?;
    Ok(RequestResponse::Created(Json(
        record.as_description(&thing.href()),
    )))
}

/// `GET /things/{id}/actions/{name}/{action_id}`
pub async fn get(
    State(state): State<AppState>,
    Path((id, name, action_id)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    let action_id = parse_action_id(&action_id)?;
    let record = thing.action(&name, action_id)?;
    Ok(Json(record.as_description(&thing.href())))
}

/// `DELETE /things/{id}/actions/{name}/{action_id}`
pub async fn delete(
    State(state): State<AppState>,
    Path((id, name, action_id)): Path<(String, String, String)>,
) -> Result<DeleteResponse, ApiError> {
    let thing = state.registry.get(&ThingId::from(id))?;
    let parsed = parse_action_id(&action_id)?;
    if thing.remove_action(&name, parsed).await {
        Ok(DeleteResponse::NoContent)
    } else {
        Err(NotFoundError::new("action request", action_id).into())
    }
}

// A malformed id can never match a queued request.
fn parse_action_id(raw: &str) -> Result<ActionId, ApiError> {
    raw.parse()
        .map_err(|_| NotFoundError::new("action request", raw).into())
}
