//! Virtual temperature sensor — read-only for clients, refreshed from the
//! device side through the sync path.

use std::sync::Arc;

use serde_json::json;

use wothub_app::bus::NotificationBus;
use wothub_app::thing::Thing;
use wothub_domain::error::WotHubError;
use wothub_domain::schema::DataSchema;

/// Build the demo sensor.
///
/// # Errors
///
/// Fails when a declaration is invalid, which would be a bug here.
pub fn sensor(bus: Arc<NotificationBus>) -> Result<Arc<Thing>, WotHubError> {
    Thing::builder("virtual-sensor", "Virtual Sensor")
        .attype("TemperatureSensor")
        .description("A simulated ambient thermometer")
        .property(
            "temperature",
            DataSchema::number()
                .title("Temperature")
                .description("The ambient temperature")
                .unit("degree celsius")
                .read_only(),
            json!(reading(0)),
        )
        .build(bus)
}

/// Temperature for one sample tick: a slow wander around 21 degrees with a
/// five-minute period, rounded to a tenth. Deterministic so tests and demos
/// see the same curve.
#[must_use]
pub fn reading(tick: u32) -> f64 {
    let phase = f64::from(tick % 60) / 60.0 * std::f64::consts::TAU;
    let degrees = 2.5f64.mul_add(phase.sin(), 21.0);
    (degrees * 10.0).round() / 10.0
}
