//! Virtual lamp — a dimmable light exercising every interactive path:
//! property writes, a long-running action, and an event.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use wothub_app::bus::NotificationBus;
use wothub_app::thing::{ActionContext, ActionTemplate, Thing};
use wothub_domain::error::{HandlerError, WotHubError};
use wothub_domain::schema::DataSchema;

/// Brightness level past which a fade overheats the lamp.
const OVERHEAT_LEVEL: f64 = 90.0;

/// Temperature reported by an `overheated` event, matching the classic
/// demo lamp.
const OVERHEAT_DEGREES: i64 = 102;

/// Build the demo lamp.
///
/// # Errors
///
/// Fails when a declaration is invalid, which would be a bug here.
pub fn lamp(bus: Arc<NotificationBus>, event_capacity: usize) -> Result<Arc<Thing>, WotHubError> {
    Thing::builder("virtual-lamp", "Virtual Lamp")
        .attype("OnOffSwitch")
        .attype("Light")
        .description("A simulated dimmable lamp")
        .event_capacity(event_capacity)
        .property(
            "on",
            DataSchema::boolean()
                .title("On/Off")
                .description("Whether the lamp is turned on"),
            json!(false),
        )
        .property(
            "brightness",
            DataSchema::integer()
                .title("Brightness")
                .description("The level of light from 0-100")
                .minimum(0.0)
                .maximum(100.0)
                .unit("percent"),
            json!(50),
        )
        .action(
            "fade",
            ActionTemplate::new(fade)
                .title("Fade")
                .description("Fade the lamp to a given level")
                .input(
                    DataSchema::object()
                        .required("brightness")
                        .required("duration")
                        .property(
                            "brightness",
                            DataSchema::integer()
                                .minimum(0.0)
                                .maximum(100.0)
                                .unit("percent"),
                        )
                        .property(
                            "duration",
                            DataSchema::integer().minimum(1.0).unit("milliseconds"),
                        ),
                ),
        )
        .event(
            "overheated",
            DataSchema::number()
                .description("The lamp has exceeded its safe operating temperature")
                .unit("degree celsius"),
        )
        .build(bus)
}

async fn fade(context: ActionContext) -> Result<(), HandlerError> {
    let (target, duration) = fade_input(context.input())?;
    tokio::time::sleep(Duration::from_millis(duration)).await;

    let thing = context.thing();
    let stored = thing
        .sync_property("brightness", target)
        .map_err(|error| HandlerError::failed(error.detail()))?;
    if stored.as_f64().is_some_and(|level| level > OVERHEAT_LEVEL) {
        thing
            .add_event("overheated", Some(json!(OVERHEAT_DEGREES)))
            .map_err(|error| HandlerError::failed(error.detail()))?;
    }
    Ok(())
}

// Input is schema-checked before the handler runs; these failures can only
// be seen by code calling the handler directly.
fn fade_input(input: Option<&Value>) -> Result<(Value, u64), HandlerError> {
    let input = input.ok_or_else(|| HandlerError::failed("missing input"))?;
    let target = input
        .get("brightness")
        .cloned()
        .ok_or_else(|| HandlerError::failed("missing brightness"))?;
    let duration = input
        .get("duration")
        .and_then(Value::as_u64)
        .ok_or_else(|| HandlerError::failed("missing duration"))?;
    Ok((target, duration))
}
