//! Thing Descriptions — the self-describing document a thing serves to
//! protocol bindings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::ThingId;
use crate::schema::DataSchema;

/// JSON-LD context advertised when a thing does not set its own.
pub const DEFAULT_CONTEXT: &str = "https://webthings.io/schemas";

/// Typed link inside a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

impl Link {
    #[must_use]
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
        }
    }
}

/// One property entry: its schema inline, plus a link to the property
/// resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescription {
    #[serde(flatten)]
    pub schema: DataSchema,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// One action entry: metadata, the input schema, and a link to the action
/// queue.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<DataSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// One event entry: the payload schema inline (type, description, unit),
/// plus a link to the event log.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventDescription {
    #[serde(flatten)]
    pub data: DataSchema,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// The full document served at `GET /things/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThingDescription {
    pub id: ThingId,
    pub title: String,
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@type", default, skip_serializing_if = "Vec::is_empty")]
    pub attype: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDescription>,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDescription>,
    #[serde(default)]
    pub events: BTreeMap<String, EventDescription>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

impl ThingDescription {
    /// Create an empty description with the default context.
    #[must_use]
    pub fn new(id: ThingId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            context: DEFAULT_CONTEXT.to_owned(),
            attype: Vec::new(),
            description: None,
            properties: BTreeMap::new(),
            actions: BTreeMap::new(),
            events: BTreeMap::new(),
            links: Vec::new(),
        }
    }
}
