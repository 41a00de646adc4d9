//! Error types shared across the workspace.
//!
//! The taxonomy mirrors the failure classes of the runtime: schema or
//! invariant violations ([`ValidationError`]), lookups of unknown
//! things/properties/actions/events ([`NotFoundError`]), malformed incoming
//! wire messages ([`DispatchError`]), and action handler failures
//! ([`HandlerError`]). Every layer converts into [`WotHubError`] via `#[from]`;
//! nothing in this taxonomy is fatal to the process.

use crate::schema::DataType;

/// Top-level error enum for the whole workspace.
#[derive(Debug, thiserror::Error)]
pub enum WotHubError {
    /// A value or aggregate violated a schema or a domain invariant.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A thing, property, action, or event could not be found.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// An incoming wire message could not be dispatched.
    #[error("dispatch error")]
    Dispatch(#[from] DispatchError),

    /// An action handler failed while executing.
    #[error("handler error")]
    Handler(#[from] HandlerError),
}

impl WotHubError {
    /// Human-readable detail for the innermost error.
    ///
    /// Protocol bindings put this into error payloads; the outer variant
    /// only selects the status code.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::NotFound(err) => err.to_string(),
            Self::Dispatch(err) => err.to_string(),
            Self::Handler(err) => err.to_string(),
        }
    }
}

/// Schema or invariant violation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// The value's JSON type does not match the schema's declared type.
    #[error("expected {expected} value, found {found}")]
    TypeMismatch {
        expected: DataType,
        found: &'static str,
    },

    /// A numeric value fell below the schema's `minimum`.
    #[error("value {found} is below the minimum of {minimum}")]
    BelowMinimum { minimum: f64, found: f64 },

    /// A numeric value exceeded the schema's `maximum`.
    #[error("value {found} is above the maximum of {maximum}")]
    AboveMaximum { maximum: f64, found: f64 },

    /// The value is not one of the schema's enumerated alternatives.
    #[error("value is not in the allowed enumeration")]
    NotInEnumeration,

    /// A required object member is absent.
    #[error("missing required field `{field}`")]
    MissingRequired { field: String },

    /// A write targeted a read-only property.
    #[error("property `{name}` is read-only")]
    ReadOnly { name: String },

    /// A thing was built without an id.
    #[error("thing id must not be empty")]
    EmptyId,

    /// A thing was built without a title.
    #[error("thing title must not be empty")]
    EmptyTitle,

    /// A rule was built without a name.
    #[error("rule name must not be empty")]
    EmptyName,

    /// Two members of the same kind share a name: properties, actions, or
    /// events within one thing, or a rule loaded twice.
    #[error("duplicate {kind} name `{name}`")]
    DuplicateName { kind: &'static str, name: String },

    /// A thing with this id is already registered.
    #[error("a thing with id `{id}` is already registered")]
    DuplicateThing { id: String },

    /// A rule was built without premises.
    #[error("rule has no premises")]
    NoPremises,

    /// A rule was built without conclusions.
    #[error("rule has no conclusions")]
    NoConclusions,
}

/// Lookup failure for a thing or one of its members.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} `{id}` not found")]
pub struct NotFoundError {
    /// What kind of object was looked up (`"thing"`, `"property"`, …).
    pub kind: &'static str,
    /// The identifier that was not found.
    pub id: String,
}

impl NotFoundError {
    /// Shorthand constructor.
    #[must_use]
    pub fn new(kind: &'static str, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Malformed incoming message on the WebSocket or MQTT binding.
///
/// Reported back to the connection that sent the message; never broadcast.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The payload is not valid JSON.
    #[error("message is not valid JSON")]
    InvalidJson,

    /// The message carries no `messageType` field.
    #[error("message is missing `messageType`")]
    MissingMessageType,

    /// The message carries no `data` field.
    #[error("message is missing `data`")]
    MissingData,

    /// The request body must name exactly one member.
    #[error("request must contain exactly one member")]
    NotSingleMember,

    /// The `messageType` is not one the runtime understands.
    #[error("unknown message type `{0}`")]
    UnknownMessageType(String),

    /// A status-bearing message type arrived as a request.
    #[error("`{0}` is not a request message type")]
    NotARequest(&'static str),
}

/// Action handler failure, captured around handler execution.
///
/// Recorded on the action instance and published as a failed status; it
/// never reaches the thing's or the bus's control flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// The handler returned an error.
    #[error("{0}")]
    Failed(String),

    /// The handler exceeded its configured deadline.
    #[error("action handler timed out")]
    TimedOut,
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
