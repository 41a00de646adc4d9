//! Action requests and their lifecycle.
//!
//! Every invocation of an action produces an [`ActionRecord`] that moves
//! through `created -> pending -> completed | failed`. Cancellation removes
//! the record instead of adding a fifth status.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::ActionId;
use crate::time::{self, Timestamp};

/// Lifecycle stage of one action request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Accepted, execution not yet started.
    Created,
    /// Handler is running.
    Pending,
    /// Handler finished successfully.
    Completed,
    /// Handler returned an error.
    Failed,
}

impl ActionStatus {
    /// Whether the request can no longer change status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Pending => f.write_str("pending"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// One accepted invocation of an action.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    id: ActionId,
    name: String,
    input: Option<Value>,
    status: ActionStatus,
    time_requested: Timestamp,
    time_completed: Option<Timestamp>,
    error: Option<String>,
}

impl ActionRecord {
    /// Create a freshly accepted request in the `created` status.
    #[must_use]
    pub fn new(name: impl Into<String>, input: Option<Value>) -> Self {
        Self {
            id: ActionId::new(),
            name: name.into(),
            input,
            status: ActionStatus::Created,
            time_requested: time::now(),
            time_completed: None,
            error: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> ActionId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> ActionStatus {
        self.status
    }

    #[must_use]
    pub fn time_requested(&self) -> Timestamp {
        self.time_requested
    }

    #[must_use]
    pub fn time_completed(&self) -> Option<Timestamp> {
        self.time_completed
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Mark the handler as running.
    pub fn start(&mut self) {
        self.status = ActionStatus::Pending;
    }

    /// Mark the request as successfully finished, stamping the completion
    /// time.
    pub fn complete(&mut self) {
        self.status = ActionStatus::Completed;
        self.time_completed = Some(time::now());
    }

    /// Mark the request as failed. The completion time stays unset; only a
    /// successful run gets one.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ActionStatus::Failed;
        self.error = Some(message.into());
    }

    /// Wire representation, a single-key object as clients expect:
    /// `{"fade": {"href": ..., "status": ..., ...}}`.
    ///
    /// `thing_href` is the owning thing's base path, e.g. `/things/lamp`.
    #[must_use]
    pub fn as_description(&self, thing_href: &str) -> Value {
        let mut inner = serde_json::Map::new();
        if let Some(input) = &self.input {
            inner.insert("input".into(), input.clone());
        }
        inner.insert(
            "href".into(),
            Value::String(format!("{thing_href}/actions/{}/{}", self.name, self.id)),
        );
        inner.insert("status".into(), Value::String(self.status.to_string()));
        inner.insert(
            "timeRequested".into(),
            Value::String(self.time_requested.to_rfc3339()),
        );
        if let Some(completed) = self.time_completed {
            inner.insert("timeCompleted".into(), Value::String(completed.to_rfc3339()));
        }
        if let Some(error) = &self.error {
            inner.insert("error".into(), Value::String(error.clone()));
        }
        let mut outer = serde_json::Map::new();
        outer.insert(self.name.clone(), Value::Object(inner));
        Value::Object(outer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_start_in_created_status() {
        let record = ActionRecord::new("fade", Some(json!({"brightness": 50})));
        assert_eq!(record.status(), ActionStatus::Created);
        assert!(record.time_completed().is_none());
        assert!(record.error().is_none());
    }

    #[test]
    fn should_progress_through_lifecycle_in_order() {
        assert!(ActionStatus::Created < ActionStatus::Pending);
        assert!(ActionStatus::Pending < ActionStatus::Completed);
    }

    #[test]
    fn should_stamp_completion_time_on_success() {
        let mut record = ActionRecord::new("fade", None);
        record.start();
        assert_eq!(record.status(), ActionStatus::Pending);
        record.complete();
        assert_eq!(record.status(), ActionStatus::Completed);
        assert!(record.time_completed().is_some());
    }

    #[test]
    fn should_keep_completion_time_unset_on_failure() {
        let mut record = ActionRecord::new("fade", None);
        record.start();
        record.fail("device unreachable");
        assert_eq!(record.status(), ActionStatus::Failed);
        assert!(record.time_completed().is_none());
        assert_eq!(record.error(), Some("device unreachable"));
    }

    #[test]
    fn should_treat_completed_and_failed_as_terminal() {
        assert!(!ActionStatus::Created.is_terminal());
        assert!(!ActionStatus::Pending.is_terminal());
        assert!(ActionStatus::Completed.is_terminal());
        assert!(ActionStatus::Failed.is_terminal());
    }

    #[test]
    fn should_describe_request_as_single_key_object() {
        let record = ActionRecord::new("fade", Some(json!({"brightness": 50})));
        let description = record.as_description("/things/lamp");
        let inner = &description["fade"];
        assert_eq!(inner["input"], json!({"brightness": 50}));
        assert_eq!(
            inner["href"],
            json!(format!("/things/lamp/actions/fade/{}", record.id()))
        );
        assert_eq!(inner["status"], "created");
        assert!(inner["timeRequested"].is_string());
        assert!(inner.get("timeCompleted").is_none());
        assert!(inner.get("error").is_none());
    }

    #[test]
    fn should_omit_input_from_description_when_absent() {
        let record = ActionRecord::new("reboot", None);
        let description = record.as_description("/things/gateway");
        assert!(description["reboot"].get("input").is_none());
    }
}
