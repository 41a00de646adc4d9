//! Per-connection pump between a socket and the notification bus.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};

use wothub_app::bus::{Notification, Topic};
use wothub_app::dispatch::{self, DispatchOutcome};
use wothub_app::registry::ThingRegistry;
use wothub_domain::envelope::Envelope;
use wothub_domain::error::WotHubError;
use wothub_domain::id::ThingId;

/// Pump one accepted socket until either side hangs up.
///
/// The connection subscribes to the thing's `state`, `event`, and `error`
/// topics on the bus; `event` notifications additionally pass the
/// per-connection filter fed by `addEventSubscription` requests. All three
/// subscriptions are dropped on disconnect, so a gone client costs the bus
/// nothing.
pub async fn run(socket: WebSocket, registry: Arc<ThingRegistry>, thing_id: ThingId) {
    let bus = Arc::clone(registry.bus());
    let (state_sub, mut state_rx) = bus.channel(Topic::state(thing_id.clone()));
    let (event_sub, mut event_rx) = bus.channel(Topic::event(thing_id.clone()));
    let (error_sub, mut error_rx) = bus.channel(Topic::error(thing_id.clone()));
    let mut subscribed_events: HashSet<String> = HashSet::new();

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(Ok(message)) = frame else { break };
                match message {
                    Message::Text(text) => {
                        let reply =
                            answer(&registry, &thing_id, text.as_str(), &mut subscribed_events)
                                .await;
                        if let Some(envelope) = reply {
                            if send(&mut sink, &envelope).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(notification) = state_rx.recv() => {
                if forward(&mut sink, &notification).await.is_err() {
                    break;
                }
            }
            Some(notification) = event_rx.recv() => {
                if wants_event(&notification, &subscribed_events)
                    && forward(&mut sink, &notification).await.is_err()
                {
                    break;
                }
            }
            Some(notification) = error_rx.recv() => {
                if forward(&mut sink, &notification).await.is_err() {
                    break;
                }
            }
        }
    }

    bus.unsubscribe(state_sub);
    bus.unsubscribe(event_sub);
    bus.unsubscribe(error_sub);
    tracing::debug!(thing = %thing_id, "websocket connection closed");
}

/// Handle one inbound frame. The reply, if any, is an error envelope that
/// goes to this connection only; successful requests answer through the bus
/// like every other notification.
async fn answer(
    registry: &ThingRegistry,
    thing_id: &ThingId,
    frame: &str,
    subscribed_events: &mut HashSet<String>,
) -> Option<Envelope> {
    let envelope = match Envelope::parse(frame) {
        Ok(envelope) => envelope,
        Err(error) => return Some(addressed_error(thing_id, &error.into())),
    };
    match dispatch::dispatch(registry, thing_id, envelope).await {
        Ok(DispatchOutcome::SubscribedEvents(names)) => {
            subscribed_events.extend(names);
            None
        }
        Ok(_) => None,
        Err(error) => Some(addressed_error(thing_id, &error)),
    }
}

fn addressed_error(thing_id: &ThingId, error: &WotHubError) -> Envelope {
    let mut envelope = dispatch::error_envelope(error);
    envelope.topic = Some(format!("things/{thing_id}"));
    envelope
}

fn wants_event(notification: &Notification, subscribed: &HashSet<String>) -> bool {
    match notification {
        Notification::Event { event, .. } => subscribed.contains(event.name()),
        _ => true,
    }
}

async fn forward(
    sink: &mut SplitSink<WebSocket, Message>,
    notification: &Notification,
) -> Result<(), axum::Error> {
    send(sink, &notification.to_envelope()).await
}

async fn send(
    sink: &mut SplitSink<WebSocket, Message>,
    envelope: &Envelope,
) -> Result<(), axum::Error> {
    let Ok(text) = serde_json::to_string(envelope) else {
        tracing::warn!("failed to encode envelope");
        return Ok(());
    };
    sink.send(Message::Text(text.into())).await
}
