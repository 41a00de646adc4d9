//! Topic layout — where thing traffic lives on the broker.
//!
//! Everything sits under one base prefix: requests arrive on
//! `<base>/things/<id>/request`, notifications go out on
//! `<base>/things/<id>/state`, `.../event` and `.../error`.

use wothub_app::bus::{Channel, Notification};
use wothub_domain::id::ThingId;

/// Maps things and channels onto broker topics under one base prefix.
#[derive(Debug, Clone)]
pub struct TopicSet {
    base: String,
}

impl TopicSet {
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// Wildcard filter matching every thing's request topic.
    #[must_use]
    pub fn request_filter(&self) -> String {
        format!("{}/things/+/request", self.base)
    }

    /// The outbound topic for one thing and channel.
    #[must_use]
    pub fn channel_topic(&self, thing_id: &ThingId, channel: Channel) -> String {
        format!("{}/things/{thing_id}/{channel}", self.base)
    }

    /// The outbound topic a notification publishes on.
    #[must_use]
    pub fn for_notification(&self, notification: &Notification) -> String {
        self.channel_topic(notification.thing_id(), notification.channel())
    }

    /// Extract the thing id from a request topic. `None` when the topic is
    /// not under this set's request layout, which makes foreign traffic on
    /// a shared broker easy to skip.
    #[must_use]
    pub fn parse_request(&self, topic: &str) -> Option<ThingId> {
        let id = topic
            .strip_prefix(&self.base)?
            .strip_prefix("/things/")?
            .strip_suffix("/request")?;
        if id.is_empty() || id.contains('/') {
            return None;
        }
        Some(ThingId::from(id))
    }
}
