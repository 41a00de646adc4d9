//! Request dispatch — the shared path from an incoming envelope to thing
//! operations. The WebSocket and MQTT bindings both funnel through here so
//! a message means the same thing on every transport.

use serde_json::Value;

use wothub_domain::action::ActionRecord;
use wothub_domain::envelope::{Envelope, MessageType};
use wothub_domain::error::{DispatchError, WotHubError};
use wothub_domain::id::ThingId;

use crate::registry::ThingRegistry;

/// What a successfully dispatched request did.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Values stored by a `setProperty`, as stored.
    PropertiesSet(serde_json::Map<String, Value>),
    /// Requests accepted by a `requestAction`.
    ActionsRequested(Vec<ActionRecord>),
    /// Values stored by a `syncProperty`, invalid entries already dropped.
    PropertiesSynced(serde_json::Map<String, Value>),
    /// Event names an `addEventSubscription` asked to observe. The binding
    /// owns the per-connection filter; the runtime only parses the request.
    SubscribedEvents(Vec<String>),
}

/// Apply a request envelope to the thing it addresses.
///
/// `setProperty` applies entries one by one and stops at the first failure,
/// leaving earlier entries applied; `syncProperty` is the device path and
/// never fails on values, it drops them instead.
///
/// # Errors
///
/// Fails when the thing is unknown, the envelope carries a status type
/// instead of a request, the data is not an object, or the addressed
/// operation rejects its entry.
pub async fn dispatch(
    registry: &ThingRegistry,
    thing_id: &ThingId,
    envelope: Envelope,
) -> Result<DispatchOutcome, WotHubError> {
    let thing = registry.get(thing_id)?;
    match envelope.message_type {
        MessageType::SetProperty => {
            let mut stored = serde_json::Map::new();
            for (name, value) in as_object(envelope.data)? {
                let value = thing.write_property(&name, value).await?;
                stored.insert(name, value);
            }
            Ok(DispatchOutcome::PropertiesSet(stored))
        }
        MessageType::RequestAction => {
            let mut accepted = Vec::new();
            for (name, request) in as_object(envelope.data)? {
                let input = request.get("input").cloned();
                accepted.push(thing.perform_action(&name, input)?);
            }
            Ok(DispatchOutcome::ActionsRequested(accepted))
        }
        MessageType::SyncProperty => {
            let entries = as_object(envelope.data)?;
            Ok(DispatchOutcome::PropertiesSynced(thing.sync_properties(entries)))
        }
        MessageType::AddEventSubscription => {
            let names = as_object(envelope.data)?.into_iter().map(|(name, _)| name);
            Ok(DispatchOutcome::SubscribedEvents(names.collect()))
        }
        other => Err(DispatchError::NotARequest(other.as_str()).into()),
    }
}

fn as_object(data: Value) -> Result<serde_json::Map<String, Value>, WotHubError> {
    match data {
        Value::Object(entries) => Ok(entries),
        _ => Err(DispatchError::MissingData.into()),
    }
}

/// The status line a binding reports for an error, HTTP-style on every
/// transport.
#[must_use]
pub fn status_line(error: &WotHubError) -> &'static str {
    match error {
        WotHubError::Validation(_) | WotHubError::Dispatch(_) => "400 Bad Request",
        WotHubError::NotFound(_) => "404 Not Found",
        WotHubError::Handler(_) => "500 Internal Server Error",
    }
}

/// Render an error as the envelope reported back to the sender. The topic
/// is left unset; bindings that address things by topic fill it in.
#[must_use]
pub fn error_envelope(error: &WotHubError) -> Envelope {
    Envelope::new(
        MessageType::Error,
        serde_json::json!({
            "status": status_line(error),
            "message": error.detail(),
        }),
    )
}
