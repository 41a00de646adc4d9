//! MQTT bridge — mirrors registered things onto an MQTT broker.
//!
//! Inbound request envelopes run through the shared dispatch path, so a
//! message means exactly what it means on the WebSocket binding. Dispatch
//! failures are answered on the thing's error topic; successful results
//! ride the state topic through the notification bus like every other
//! status change.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use wothub_app::bus::{Channel, DeliveryError, Notification, Topic};
use wothub_app::dispatch;
use wothub_app::registry::ThingRegistry;
use wothub_domain::envelope::Envelope;
use wothub_domain::error::WotHubError;
use wothub_domain::id::{SubscriptionId, ThingId};

use crate::config::MqttConfig;
use crate::error::MqttError;
use crate::topics::TopicSet;

/// Connected bridge. Dropping it leaves the tasks running; call
/// [`MqttBridge::shutdown`] to stop them.
pub struct MqttBridge {
    client: AsyncClient,
    registry: Arc<ThingRegistry>,
    subscriptions: Vec<SubscriptionId>,
    tasks: Vec<JoinHandle<()>>,
}

impl MqttBridge {
    /// Connect to the broker and bridge every thing registered right now.
    /// Things registered later are not picked up; the daemon registers its
    /// providers before starting the bridge.
    ///
    /// # Errors
    ///
    /// Fails when the request-topic subscription cannot be queued.
    pub async fn start(
        config: &MqttConfig,
        registry: Arc<ThingRegistry>,
    ) -> Result<Self, MqttError> {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));

        let topics = TopicSet::new(config.base_topic.clone());
        let (client, event_loop) = AsyncClient::new(options, 100);
        client
            .subscribe(topics.request_filter(), QoS::AtLeastOnce)
            .await?;

        // One queue across every bridged thing and channel; the forward
        // task drains it towards the broker.
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut subscriptions = Vec::new();
        for thing in registry.things() {
            for channel in [Channel::State, Channel::Event, Channel::Error] {
                let sender = sender.clone();
                let id = registry.bus().subscribe(
                    Topic::new(thing.id().clone(), channel),
                    move |notification| {
                        sender
                            .send(notification.clone())
                            .map_err(|_| DeliveryError::Disconnected)
                    },
                );
                subscriptions.push(id);
            }
        }

        let tasks = vec![
            tokio::spawn(run_event_loop(
                event_loop,
                Arc::clone(&registry),
                topics.clone(),
                client.clone(),
            )),
            tokio::spawn(run_forwarder(receiver, topics, client.clone())),
        ];

        Ok(Self {
            client,
            registry,
            subscriptions,
            tasks,
        })
    }

    /// Stop the bridge: drop the bus subscriptions, stop both tasks and
    /// ask the client to disconnect.
    pub async fn shutdown(self) {
        for id in self.subscriptions {
            self.registry.bus().unsubscribe(id);
        }
        for task in &self.tasks {
            task.abort();
        }
        if let Err(error) = self.client.disconnect().await {
            tracing::debug!(%error, "MQTT disconnect failed");
        }
    }
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    registry: Arc<ThingRegistry>,
    topics: TopicSet,
    client: AsyncClient,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if let Some((topic, reply)) =
                    answer_request(&registry, &topics, &publish.topic, &publish.payload).await
                {
                    publish_envelope(&client, &topic, &reply).await;
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("connected to MQTT broker");
                // Sessions are not persistent; renew the filter on every
                // (re)connect.
                if let Err(error) = client
                    .subscribe(topics.request_filter(), QoS::AtLeastOnce)
                    .await
                {
                    tracing::error!(%error, "failed to subscribe to request topics");
                }
            }
            Ok(_) => {}
            Err(error) => {
                tracing::error!(%error, "MQTT connection error, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn run_forwarder(
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    topics: TopicSet,
    client: AsyncClient,
) {
    while let Some(notification) = notifications.recv().await {
        let topic = topics.for_notification(&notification);
        publish_envelope(&client, &topic, &notification.to_envelope()).await;
    }
}

/// Handle one inbound publish. Returns the reply to send, or `None` when
/// the message is foreign traffic or needs no direct answer.
async fn answer_request(
    registry: &ThingRegistry,
    topics: &TopicSet,
    topic: &str,
    payload: &[u8],
) -> Option<(String, Envelope)> {
    let thing_id = topics.parse_request(topic)?;
    let text = String::from_utf8_lossy(payload);
    let envelope = match Envelope::parse(&text) {
        Ok(envelope) => envelope,
        Err(error) => return Some(error_reply(topics, &thing_id, &error.into())),
    };
    match dispatch::dispatch(registry, &thing_id, envelope).await {
        // Results ride the state topic through the bus.
        Ok(_) => None,
        Err(error) => Some(error_reply(topics, &thing_id, &error)),
    }
}

fn error_reply(
    topics: &TopicSet,
    thing_id: &ThingId,
    error: &WotHubError,
) -> (String, Envelope) {
    let mut envelope = dispatch::error_envelope(error);
    envelope.topic = Some(format!("things/{thing_id}"));
    (topics.channel_topic(thing_id, Channel::Error), envelope)
}

async fn publish_envelope(client: &AsyncClient, topic: &str, envelope: &Envelope) {
    let Ok(payload) = serde_json::to_string(envelope) else {
        tracing::warn!(topic, "failed to serialize envelope");
        return;
    };
    if let Err(error) = client
        .publish(topic, QoS::AtLeastOnce, false, payload.into_bytes())
        .await
    {
        tracing::warn!(topic, %error, "failed to publish to broker");
    }
}
