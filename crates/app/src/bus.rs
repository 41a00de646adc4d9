//! Notification bus — in-process fan-out of thing status to whoever asked.
//!
//! Subscriptions are per topic, one topic per thing and channel. Delivery is
//! synchronous and in registration order; things publish while holding their
//! own state lock, which is what makes same-topic notifications arrive in
//! the order the changes were applied. Subscriber callbacks must therefore
//! stay cheap and must never call back into the publishing thing.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;

use wothub_domain::action::ActionRecord;
use wothub_domain::envelope::{Envelope, MessageType};
use wothub_domain::event::EventRecord;
use wothub_domain::id::{SubscriptionId, ThingId};

/// Channel a notification travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Property and action status updates.
    State,
    /// Event occurrences.
    Event,
    /// Failures the runtime reports asynchronously.
    Error,
}

impl Channel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Event => "event",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addressing key for subscriptions: one thing, one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub thing_id: ThingId,
    pub channel: Channel,
}

impl Topic {
    #[must_use]
    pub fn new(thing_id: ThingId, channel: Channel) -> Self {
        Self { thing_id, channel }
    }

    #[must_use]
    pub fn state(thing_id: ThingId) -> Self {
        Self::new(thing_id, Channel::State)
    }

    #[must_use]
    pub fn event(thing_id: ThingId) -> Self {
        Self::new(thing_id, Channel::Event)
    }

    #[must_use]
    pub fn error(thing_id: ThingId) -> Self {
        Self::new(thing_id, Channel::Error)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.thing_id, self.channel)
    }
}

/// Something a thing (or the rule engine) wants the outside world to know.
#[derive(Debug, Clone)]
pub enum Notification {
    /// One or more property values changed; the map holds the values as
    /// stored at the moment of publishing.
    PropertyStatus {
        thing_id: ThingId,
        values: serde_json::Map<String, Value>,
    },
    /// An action request changed status.
    ActionStatus {
        thing_id: ThingId,
        action: ActionRecord,
    },
    /// An event occurred.
    Event {
        thing_id: ThingId,
        event: EventRecord,
    },
    /// An asynchronous operation on the thing failed.
    Error {
        thing_id: ThingId,
        status: String,
        message: String,
    },
}

impl Notification {
    #[must_use]
    pub fn thing_id(&self) -> &ThingId {
        match self {
            Self::PropertyStatus { thing_id, .. }
            | Self::ActionStatus { thing_id, .. }
            | Self::Event { thing_id, .. }
            | Self::Error { thing_id, .. } => thing_id,
        }
    }

    #[must_use]
    pub fn channel(&self) -> Channel {
        match self {
            Self::PropertyStatus { .. } | Self::ActionStatus { .. } => Channel::State,
            Self::Event { .. } => Channel::Event,
            Self::Error { .. } => Channel::Error,
        }
    }

    #[must_use]
    pub fn topic(&self) -> Topic {
        Topic::new(self.thing_id().clone(), self.channel())
    }

    /// Render to the wire envelope pushed over WebSocket and MQTT.
    #[must_use]
    pub fn to_envelope(&self) -> Envelope {
        match self {
            Self::PropertyStatus { thing_id, values } => Envelope::for_thing(
                thing_id,
                MessageType::PropertyStatus,
                Value::Object(values.clone()),
            ),
            Self::ActionStatus { thing_id, action } => Envelope::for_thing(
                thing_id,
                MessageType::ActionStatus,
                action.as_description(&format!("/things/{thing_id}")),
            ),
            Self::Event { thing_id, event } => {
                Envelope::for_thing(thing_id, MessageType::Event, event.as_description())
            }
            Self::Error {
                thing_id,
                status,
                message,
            } => Envelope::for_thing(
                thing_id,
                MessageType::Error,
                serde_json::json!({ "status": status, "message": message }),
            ),
        }
    }
}

/// Why a subscriber did not take a delivery.
#[derive(Debug)]
pub enum DeliveryError {
    /// The subscriber is gone for good; the bus removes it.
    Disconnected,
    /// The subscriber failed this one delivery; the bus logs and moves on.
    Failed(String),
}

type Callback = std::sync::Arc<dyn Fn(&Notification) -> Result<(), DeliveryError> + Send + Sync>;

struct Registration {
    id: SubscriptionId,
    callback: Callback,
}

/// Per-topic subscription table.
///
/// Publishing never blocks on a subscriber: failures are logged, and a
/// [`DeliveryError::Disconnected`] return removes the subscription the next
/// time its topic publishes.
pub struct NotificationBus {
    topics: Mutex<HashMap<Topic, Vec<Registration>>>,
}

impl NotificationBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<Topic, Vec<Registration>>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a callback on one topic. The callback runs on the
    /// publisher's thread, possibly while the publishing thing holds its
    /// state lock.
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> SubscriptionId
    where
        F: Fn(&Notification) -> Result<(), DeliveryError> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.table().entry(topic).or_default().push(Registration {
            id,
            callback: std::sync::Arc::new(callback),
        });
        id
    }

    /// Remove one subscription. Returns `false` when the id is unknown,
    /// which happens routinely when a subscriber was already pruned as
    /// disconnected.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut table = self.table();
        let mut found = false;
        table.retain(|_, registrations| {
            if !found {
                if let Some(position) = registrations.iter().position(|r| r.id == id) {
                    registrations.remove(position);
                    found = true;
                }
            }
            !registrations.is_empty()
        });
        found
    }

    /// Subscribe by queue instead of callback: notifications on `topic` are
    /// pushed into an unbounded channel. This is how async consumers (the
    /// WebSocket binding, tests) attach to the synchronous bus. Dropping the
    /// receiver ends the subscription lazily.
    pub fn channel(
        &self,
        topic: Topic,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.subscribe(topic, move |notification| {
            sender
                .send(notification.clone())
                .map_err(|_| DeliveryError::Disconnected)
        });
        (id, receiver)
    }

    /// Deliver to every subscriber of the notification's topic, in
    /// registration order.
    pub fn publish(&self, notification: &Notification) {
        let topic = notification.topic();
        let snapshot: Vec<(SubscriptionId, Callback)> = self
            .table()
            .get(&topic)
            .map(|registrations| {
                registrations
                    .iter()
                    .map(|r| (r.id, std::sync::Arc::clone(&r.callback)))
                    .collect()
            })
            .unwrap_or_default();

        let mut disconnected = Vec::new();
        for (id, callback) in snapshot {
            match callback(notification) {
                Ok(()) => {}
                Err(DeliveryError::Disconnected) => disconnected.push(id),
                Err(DeliveryError::Failed(reason)) => {
                    tracing::warn!(
                        topic = %topic,
                        subscription = %id,
                        reason = %reason,
                        "subscriber refused delivery"
                    );
                }
            }
        }

        if !disconnected.is_empty() {
            tracing::debug!(
                topic = %topic,
                count = disconnected.len(),
                "pruning disconnected subscribers"
            );
            let mut table = self.table();
            if let Some(registrations) = table.get_mut(&topic) {
                registrations.retain(|r| !disconnected.contains(&r.id));
                if registrations.is_empty() {
                    table.remove(&topic);
                }
            }
        }
    }

    /// Remove every subscription on every topic of one thing. Called when a
    /// thing leaves the registry.
    pub fn drop_thing(&self, thing_id: &ThingId) {
        self.table().retain(|topic, _| topic.thing_id != *thing_id);
    }

    /// Number of live subscriptions on a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.table().get(topic).map_or(0, Vec::len)
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    fn property_status(thing: &str) -> Notification {
        let mut values = serde_json::Map::new();
        values.insert("on".to_owned(), json!(true));
        Notification::PropertyStatus {
            thing_id: ThingId::from(thing),
            values,
        }
    }

    #[test]
    fn should_deliver_to_matching_topic_only() {
        let bus = NotificationBus::new();
        let state_hits = Arc::new(Mutex::new(0));
        let event_hits = Arc::new(Mutex::new(0));

        let counted = Arc::clone(&state_hits);
        bus.subscribe(Topic::state(ThingId::from("lamp")), move |_| {
            *counted.lock().unwrap() += 1;
            Ok(())
        });
        let counted = Arc::clone(&event_hits);
        bus.subscribe(Topic::event(ThingId::from("lamp")), move |_| {
            *counted.lock().unwrap() += 1;
            Ok(())
        });

        bus.publish(&property_status("lamp"));
        bus.publish(&property_status("other"));

        assert_eq!(*state_hits.lock().unwrap(), 1);
        assert_eq!(*event_hits.lock().unwrap(), 0);
    }

    #[test]
    fn should_deliver_in_registration_order() {
        let bus = NotificationBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for label in 1..=3 {
            let order = Arc::clone(&order);
            bus.subscribe(Topic::state(ThingId::from("lamp")), move |_| {
                order.lock().unwrap().push(label);
                Ok(())
            });
        }

        bus.publish(&property_status("lamp"));

        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn should_keep_delivering_past_failing_subscriber() {
        let bus = NotificationBus::new();
        bus.subscribe(Topic::state(ThingId::from("lamp")), |_| {
            Err(DeliveryError::Failed("busy".to_owned()))
        });
        let delivered = Arc::new(Mutex::new(0));
        let counted = Arc::clone(&delivered);
        bus.subscribe(Topic::state(ThingId::from("lamp")), move |_| {
            *counted.lock().unwrap() += 1;
            Ok(())
        });

        bus.publish(&property_status("lamp"));
        bus.publish(&property_status("lamp"));

        assert_eq!(*delivered.lock().unwrap(), 2);
        // A failing subscriber is not removed.
        assert_eq!(bus.subscriber_count(&Topic::state(ThingId::from("lamp"))), 2);
    }

    #[test]
    fn should_prune_disconnected_subscriber_on_next_publish() {
        let bus = NotificationBus::new();
        let topic = Topic::state(ThingId::from("lamp"));
        let (_, receiver) = bus.channel(topic.clone());
        assert_eq!(bus.subscriber_count(&topic), 1);

        drop(receiver);
        bus.publish(&property_status("lamp"));

        assert_eq!(bus.subscriber_count(&topic), 0);
    }

    #[test]
    fn should_stop_delivering_after_unsubscribe() {
        let bus = NotificationBus::new();
        let delivered = Arc::new(Mutex::new(0));
        let counted = Arc::clone(&delivered);
        let id = bus.subscribe(Topic::state(ThingId::from("lamp")), move |_| {
            *counted.lock().unwrap() += 1;
            Ok(())
        });

        bus.publish(&property_status("lamp"));
        assert!(bus.unsubscribe(id));
        bus.publish(&property_status("lamp"));

        assert_eq!(*delivered.lock().unwrap(), 1);
        assert!(!bus.unsubscribe(id));
    }

    #[tokio::test]
    async fn should_queue_notifications_for_channel_subscribers() {
        let bus = NotificationBus::new();
        let (_, mut receiver) = bus.channel(Topic::state(ThingId::from("lamp")));

        bus.publish(&property_status("lamp"));

        let received = receiver.recv().await.unwrap();
        assert!(matches!(
            received,
            Notification::PropertyStatus { thing_id, .. } if thing_id.as_str() == "lamp"
        ));
    }

    #[test]
    fn should_drop_every_subscription_of_a_thing() {
        let bus = NotificationBus::new();
        bus.subscribe(Topic::state(ThingId::from("lamp")), |_| Ok(()));
        bus.subscribe(Topic::event(ThingId::from("lamp")), |_| Ok(()));
        bus.subscribe(Topic::state(ThingId::from("sensor")), |_| Ok(()));

        bus.drop_thing(&ThingId::from("lamp"));

        assert_eq!(bus.subscriber_count(&Topic::state(ThingId::from("lamp"))), 0);
        assert_eq!(bus.subscriber_count(&Topic::event(ThingId::from("lamp"))), 0);
        assert_eq!(
            bus.subscriber_count(&Topic::state(ThingId::from("sensor"))),
            1
        );
    }

    #[test]
    fn should_render_error_notification_to_envelope() {
        let notification = Notification::Error {
            thing_id: ThingId::from("lamp"),
            status: "400 Bad Request".to_owned(),
            message: "expected integer, found string".to_owned(),
        };
        let envelope = notification.to_envelope();
        assert_eq!(envelope.topic.as_deref(), Some("things/lamp"));
        assert_eq!(envelope.message_type, MessageType::Error);
        assert_eq!(envelope.data["status"], "400 Bad Request");
    }

    #[test]
    fn should_route_notifications_to_their_channel() {
        assert_eq!(property_status("lamp").channel(), Channel::State);
        let event = Notification::Event {
            thing_id: ThingId::from("lamp"),
            event: EventRecord::new("overheated", Some(json!(102))),
        };
        assert_eq!(event.channel(), Channel::Event);
        assert_eq!(event.topic().to_string(), "lamp/event");
    }
}
