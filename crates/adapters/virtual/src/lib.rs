//! # wothub-adapter-virtual
//!
//! Simulated things for demos and tests: a lamp covering the interactive
//! paths and a sensor covering the device-side sync path.
//!
//! ## Provided things
//!
//! | Thing | Id | Behaviour |
//! |-------|----|-----------|
//! | Virtual Lamp | `virtual-lamp` | `on` / `brightness` properties, `fade` action, `overheated` event |
//! | Virtual Sensor | `virtual-sensor` | Read-only `temperature`, refreshed every few seconds |
//!
//! ## Dependency rule
//!
//! Depends on `wothub-app` (provider port) and `wothub-domain` only.

mod things;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use wothub_app::bus::NotificationBus;
use wothub_app::provider::ThingProvider;
use wothub_app::thing::{DEFAULT_EVENT_CAPACITY, Thing};
use wothub_domain::error::WotHubError;

/// How often the sensor takes a reading.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Provider for the simulated demo things.
pub struct VirtualProvider {
    event_capacity: usize,
    sampler: Option<JoinHandle<()>>,
}

impl VirtualProvider {
    /// Provider whose things keep `event_capacity` event occurrences.
    #[must_use]
    pub fn new(event_capacity: usize) -> Self {
        Self {
            event_capacity,
            sampler: None,
        }
    }
}

impl Default for VirtualProvider {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl ThingProvider for VirtualProvider {
    fn name(&self) -> &'static str {
        "virtual"
    }

    async fn setup(&mut self, bus: Arc<NotificationBus>) -> Result<Vec<Arc<Thing>>, WotHubError> {
        let lamp = things::lamp(Arc::clone(&bus), self.event_capacity)?;
        let sensor = things::sensor(bus)?;

        let sampled = Arc::clone(&sensor);
        self.sampler = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
            let mut tick: u32 = 0;
            loop {
                interval.tick().await;
                tick = tick.wrapping_add(1);
                let degrees = serde_json::json!(things::reading(tick));
                if let Err(error) = sampled.sync_property("temperature", degrees) {
                    tracing::warn!(%error, "sensor sample rejected");
                }
            }
        }));

        Ok(vec![lamp, sensor])
    }

    async fn teardown(&mut self) -> Result<(), WotHubError> {
        if let Some(sampler) = self.sampler.take() {
            sampler.abort();
        }
        Ok(())
    }
}
