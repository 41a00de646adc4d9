//! Thing registry — the single live index of things by id.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use wothub_domain::error::{NotFoundError, ValidationError, WotHubError};
use wothub_domain::id::ThingId;

use crate::bus::NotificationBus;
use crate::thing::Thing;

/// Owns the set of live things and the bus they publish on.
///
/// Everything serving things (HTTP, WebSocket, MQTT, the rule engine) goes
/// through the registry; a thing that is not registered does not exist.
pub struct ThingRegistry {
    bus: Arc<NotificationBus>,
    things: Mutex<BTreeMap<ThingId, Arc<Thing>>>,
}

impl ThingRegistry {
    #[must_use]
    pub fn new(bus: Arc<NotificationBus>) -> Self {
        Self {
            bus,
            things: Mutex::new(BTreeMap::new()),
        }
    }

    /// The bus registered things publish on.
    #[must_use]
    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    fn table(&self) -> MutexGuard<'_, BTreeMap<ThingId, Arc<Thing>>> {
        self.things.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a thing.
    ///
    /// # Errors
    ///
    /// Fails when a thing with the same id is already registered; ids are
    /// the one piece of registry state that must never be corrupted.
    pub fn add(&self, thing: Arc<Thing>) -> Result<(), WotHubError> {
        let mut things = self.table();
        if things.contains_key(thing.id()) {
            return Err(ValidationError::DuplicateThing {
                id: thing.id().to_string(),
            }
            .into());
        }
        things.insert(thing.id().clone(), thing);
        Ok(())
    }

    /// Deregister a thing: abort its action tasks and drop every bus
    /// subscription on its topics. Returns the thing, or `None` when the id
    /// is unknown.
    pub fn remove(&self, id: &ThingId) -> Option<Arc<Thing>> {
        let thing = self.table().remove(id)?;
        thing.shutdown();
        self.bus.drop_thing(id);
        Some(thing)
    }

    /// Look up a thing.
    ///
    /// # Errors
    ///
    /// Fails when the id is unknown.
    pub fn get(&self, id: &ThingId) -> Result<Arc<Thing>, WotHubError> {
        self.table()
            .get(id)
            .cloned()
            .ok_or_else(|| NotFoundError::new("thing", id.as_str()).into())
    }

    #[must_use]
    pub fn contains(&self, id: &ThingId) -> bool {
        self.table().contains_key(id)
    }

    /// Registered ids, ordered.
    #[must_use]
    pub fn ids(&self) -> Vec<ThingId> {
        self.table().keys().cloned().collect()
    }

    /// All registered things, ordered by id.
    #[must_use]
    pub fn things(&self) -> Vec<Arc<Thing>> {
        self.table().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use wothub_domain::schema::DataSchema;

    use super::*;
    use crate::bus::Topic;

    fn registry() -> ThingRegistry {
        ThingRegistry::new(Arc::new(NotificationBus::new()))
    }

    fn lamp(registry: &ThingRegistry) -> Arc<Thing> {
        Thing::builder("lamp", "Lamp")
            .property("on", DataSchema::boolean(), json!(false))
            .build(Arc::clone(registry.bus()))
            .unwrap()
    }

    #[test]
    fn should_register_and_look_up_thing() {
        let registry = registry();
        let thing = lamp(&registry);
        registry.add(Arc::clone(&thing)).unwrap();

        let found = registry.get(&ThingId::from("lamp")).unwrap();
        assert_eq!(found.id(), thing.id());
        assert!(registry.contains(&ThingId::from("lamp")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn should_reject_duplicate_id() {
        let registry = registry();
        registry.add(lamp(&registry)).unwrap();
        let result = registry.add(lamp(&registry));
        assert!(matches!(
            result,
            Err(WotHubError::Validation(ValidationError::DuplicateThing { .. }))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn should_report_unknown_thing_as_not_found() {
        let registry = registry();
        assert!(matches!(
            registry.get(&ThingId::from("ghost")),
            Err(WotHubError::NotFound(_))
        ));
        assert!(registry.remove(&ThingId::from("ghost")).is_none());
    }

    #[test]
    fn should_drop_bus_subscriptions_when_removing_thing() {
        let registry = registry();
        registry.add(lamp(&registry)).unwrap();
        let topic = Topic::state(ThingId::from("lamp"));
        registry.bus().subscribe(topic.clone(), |_| Ok(()));
        assert_eq!(registry.bus().subscriber_count(&topic), 1);

        let removed = registry.remove(&ThingId::from("lamp"));
        assert!(removed.is_some());
        assert_eq!(registry.bus().subscriber_count(&topic), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn should_list_ids_in_order() {
        let registry = registry();
        for id in ["zulu", "alpha", "mike"] {
            let thing = Thing::builder(id, "A thing")
                .build(Arc::clone(registry.bus()))
                .unwrap();
            registry.add(thing).unwrap();
        }
        let ids: Vec<_> = registry.ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["alpha", "mike", "zulu"]);
    }
}
