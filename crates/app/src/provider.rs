//! Provider port — how integrations contribute things to the hub.

use std::future::Future;
use std::sync::Arc;

use wothub_domain::error::WotHubError;

use crate::bus::NotificationBus;
use crate::thing::Thing;

/// Driven port implemented by every integration that brings things.
///
/// The composition root calls [`setup`](ThingProvider::setup) once at boot
/// and registers whatever comes back, then [`teardown`](ThingProvider::teardown)
/// on shutdown. Providers own their background work (pollers, device
/// connections); the hub only owns the things.
pub trait ThingProvider {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Build this provider's things against the given bus and start any
    /// background work they need.
    fn setup(
        &mut self,
        bus: Arc<NotificationBus>,
    ) -> impl Future<Output = Result<Vec<Arc<Thing>>, WotHubError>> + Send;

    /// Stop background work. The default does nothing.
    fn teardown(&mut self) -> impl Future<Output = Result<(), WotHubError>> + Send {
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use wothub_domain::schema::DataSchema;

    use super::*;

    struct SingleLampProvider;

    impl ThingProvider for SingleLampProvider {
        fn name(&self) -> &'static str {
            "single-lamp"
        }

        async fn setup(
            &mut self,
            bus: Arc<NotificationBus>,
        ) -> Result<Vec<Arc<Thing>>, WotHubError> {
            let lamp = Thing::builder("lamp", "Lamp")
                .property("on", DataSchema::boolean(), json!(false))
                .build(bus)?;
            Ok(vec![lamp])
        }
    }

    #[tokio::test]
    async fn should_setup_things_and_default_teardown() {
        let mut provider = SingleLampProvider;
        let things = provider
            .setup(Arc::new(NotificationBus::new()))
            .await
            .unwrap();
        assert_eq!(things.len(), 1);
        assert_eq!(things[0].id().as_str(), "lamp");
        provider.teardown().await.unwrap();
    }
}
