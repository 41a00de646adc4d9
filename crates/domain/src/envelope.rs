//! Message envelopes — the one JSON shape shared by the WebSocket and MQTT
//! bindings, in both directions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;
use crate::id::ThingId;

/// Kind of message an envelope carries.
///
/// The first four are requests sent by clients; the last four are statuses
/// pushed by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    SetProperty,
    RequestAction,
    SyncProperty,
    AddEventSubscription,
    PropertyStatus,
    ActionStatus,
    Event,
    Error,
}

impl MessageType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetProperty => "setProperty",
            Self::RequestAction => "requestAction",
            Self::SyncProperty => "syncProperty",
            Self::AddEventSubscription => "addEventSubscription",
            Self::PropertyStatus => "propertyStatus",
            Self::ActionStatus => "actionStatus",
            Self::Event => "event",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = DispatchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "setProperty" => Ok(Self::SetProperty),
            "requestAction" => Ok(Self::RequestAction),
            "syncProperty" => Ok(Self::SyncProperty),
            "addEventSubscription" => Ok(Self::AddEventSubscription),
            "propertyStatus" => Ok(Self::PropertyStatus),
            "actionStatus" => Ok(Self::ActionStatus),
            "event" => Ok(Self::Event),
            "error" => Ok(Self::Error),
            other => Err(DispatchError::UnknownMessageType(other.to_owned())),
        }
    }
}

/// One message on the wire.
///
/// `topic` identifies the thing (`things/<id>`); connection-scoped bindings
/// leave it out because the connection already names the thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(rename = "messageType")]
    pub message_type: MessageType,
    pub data: Value,
}

impl Envelope {
    /// Create an envelope without a topic.
    #[must_use]
    pub fn new(message_type: MessageType, data: Value) -> Self {
        Self {
            topic: None,
            message_type,
            data,
        }
    }

    /// Create an envelope addressed to one thing.
    #[must_use]
    pub fn for_thing(thing_id: &ThingId, message_type: MessageType, data: Value) -> Self {
        Self {
            topic: Some(format!("things/{thing_id}")),
            message_type,
            data,
        }
    }

    /// Parse an incoming message.
    ///
    /// # Errors
    ///
    /// Distinguishes the ways a message can be malformed so the sender gets
    /// a precise complaint: not JSON, no object, no `messageType`, an
    /// unknown `messageType`, or no `data`.
    pub fn parse(raw: &str) -> Result<Self, DispatchError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| DispatchError::InvalidJson)?;
        let Value::Object(mut fields) = value else {
            return Err(DispatchError::InvalidJson);
        };
        let message_type: MessageType = fields
            .get("messageType")
            .and_then(Value::as_str)
            .ok_or(DispatchError::MissingMessageType)?
            .parse()?;
        let data = fields.remove("data").ok_or(DispatchError::MissingData)?;
        let topic = fields.get("topic").and_then(Value::as_str).map(str::to_owned);
        Ok(Self {
            topic,
            message_type,
            data,
        })
    }
}
