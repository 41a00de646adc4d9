//! Thing — the runtime aggregate behind every device the hub exposes.
//!
//! A `Thing` owns its property values, its queue of action requests, and its
//! recent events, all behind one `std::sync::Mutex`. The lock is never held
//! across an await; notifications are published while it is held, so what
//! subscribers see always matches what is stored, in the order it was
//! stored.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use wothub_domain::action::ActionRecord;
use wothub_domain::description::{
    ActionDescription, DEFAULT_CONTEXT, EventDescription, Link, PropertyDescription,
    ThingDescription,
};
use wothub_domain::error::{HandlerError, NotFoundError, ValidationError, WotHubError};
use wothub_domain::event::EventRecord;
use wothub_domain::id::{ActionId, ThingId};
use wothub_domain::property::PropertyCell;
use wothub_domain::schema::DataSchema;

use crate::bus::{Notification, NotificationBus};

/// Events kept per thing when the builder does not say otherwise.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

type BoxFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;
type Handler = Arc<dyn Fn(ActionContext) -> BoxFuture + Send + Sync>;
type WriteHook = Arc<dyn Fn(String, Value) -> BoxFuture + Send + Sync>;
type CancelHook = Arc<dyn Fn(ActionId) -> BoxFuture + Send + Sync>;

/// What an action handler gets to work with: the owning thing, the id of
/// its own request, and the validated input.
#[derive(Clone)]
pub struct ActionContext {
    thing: Arc<Thing>,
    action_id: ActionId,
    input: Option<Value>,
}

impl ActionContext {
    #[must_use]
    pub fn thing(&self) -> &Arc<Thing> {
        &self.thing
    }

    #[must_use]
    pub fn action_id(&self) -> ActionId {
        self.action_id
    }

    #[must_use]
    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }
}

/// Declaration of one action: metadata, input schema, and the handler run
/// for each request.
pub struct ActionTemplate {
    title: Option<String>,
    description: Option<String>,
    input: Option<DataSchema>,
    handler: Handler,
    cancel: Option<CancelHook>,
    timeout: Option<Duration>,
}

impl ActionTemplate {
    /// Declare an action executed by `handler`. Each accepted request runs
    /// the handler on its own task.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Self {
            title: None,
            description: None,
            input: None,
            handler: Arc::new(move |context| Box::pin(handler(context))),
            cancel: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Schema every request input is validated against. Declaring one makes
    /// input mandatory; requests without input are validated as `null`.
    #[must_use]
    pub fn input(mut self, schema: DataSchema) -> Self {
        self.input = Some(schema);
        self
    }

    /// Hook run after a live request of this action was cancelled.
    #[must_use]
    pub fn on_cancel<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ActionId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.cancel = Some(Arc::new(move |action_id| Box::pin(hook(action_id))));
        self
    }

    /// Deadline for the handler. Exceeding it fails the request with a
    /// timeout error. Without one the handler may run forever, which is what
    /// the classic gateway did.
    #[must_use]
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }
}

struct ActionInstance {
    record: ActionRecord,
    task: Option<JoinHandle<()>>,
}

struct ThingState {
    properties: BTreeMap<String, PropertyCell>,
    instances: HashMap<String, Vec<ActionInstance>>,
    events: VecDeque<EventRecord>,
    event_capacity: usize,
}

/// One exposed device (or purely virtual object) with typed state.
///
/// Built through [`Thing::builder`]; lives behind an `Arc` because action
/// tasks and protocol bindings hold onto it concurrently.
pub struct Thing {
    id: ThingId,
    title: String,
    context: String,
    attype: Vec<String>,
    description: Option<String>,
    bus: Arc<NotificationBus>,
    actions: HashMap<String, ActionTemplate>,
    events: HashMap<String, DataSchema>,
    write_hooks: HashMap<String, WriteHook>,
    state: Mutex<ThingState>,
}

impl Thing {
    /// Start declaring a thing.
    #[must_use]
    pub fn builder(id: impl Into<ThingId>, title: impl Into<String>) -> ThingBuilder {
        ThingBuilder {
            id: id.into(),
            title: title.into(),
            context: DEFAULT_CONTEXT.to_owned(),
            attype: Vec::new(),
            description: None,
            properties: Vec::new(),
            write_hooks: HashMap::new(),
            actions: Vec::new(),
            events: Vec::new(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ThingId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Base path of this thing's HTTP resources.
    #[must_use]
    pub fn href(&self) -> String {
        format!("/things/{}", self.id)
    }

    fn state(&self) -> MutexGuard<'_, ThingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // The publish helpers are called while the caller holds the state lock.
    // That is what keeps the state channel in applied order.

    fn publish_values(&self, values: serde_json::Map<String, Value>) {
        self.bus.publish(&Notification::PropertyStatus {
            thing_id: self.id.clone(),
            values,
        });
    }

    fn publish_action(&self, record: ActionRecord) {
        self.bus.publish(&Notification::ActionStatus {
            thing_id: self.id.clone(),
            action: record,
        });
    }

    fn publish_event(&self, record: EventRecord) {
        self.bus.publish(&Notification::Event {
            thing_id: self.id.clone(),
            event: record,
        });
    }

    /// Current value of one property.
    ///
    /// # Errors
    ///
    /// Fails when the property does not exist.
    pub fn read_property(&self, name: &str) -> Result<Value, WotHubError> {
        let state = self.state();
        let cell = state
            .properties
            .get(name)
            .ok_or_else(|| NotFoundError::new("property", name))?;
        Ok(cell.value().clone())
    }

    /// Snapshot of all property values.
    #[must_use]
    pub fn properties(&self) -> serde_json::Map<String, Value> {
        let state = self.state();
        state
            .properties
            .iter()
            .map(|(name, cell)| (name.clone(), cell.value().clone()))
            .collect()
    }

    /// Client-facing write: validate, store, publish, then forward to the
    /// device through the property's write hook, if any.
    ///
    /// Returns the stored value. A failing hook is logged and does not undo
    /// the write; the stored value is already the truth the hub advertises.
    ///
    /// # Errors
    ///
    /// Fails on unknown properties, read-only properties, and schema
    /// violations; the stored value is unchanged in all three cases.
    pub async fn write_property(&self, name: &str, value: Value) -> Result<Value, WotHubError> {
        let stored = {
            let mut state = self.state();
            let cell = state
                .properties
                .get_mut(name)
                .ok_or_else(|| NotFoundError::new("property", name))?;
            cell.set(value)?;
            let stored = cell.value().clone();
            let mut values = serde_json::Map::new();
            values.insert(name.to_owned(), stored.clone());
            self.publish_values(values);
            stored
        };
        if let Some(hook) = self.write_hooks.get(name) {
            if let Err(error) = hook(name.to_owned(), stored.clone()).await {
                tracing::warn!(
                    thing = %self.id,
                    property = name,
                    %error,
                    "write forwarder failed"
                );
            }
        }
        Ok(stored)
    }

    /// Device-facing write: validate and store, bypassing `readOnly` and
    /// skipping the write hook so a forwarded write cannot echo forever.
    ///
    /// # Errors
    ///
    /// Fails on unknown properties and schema violations.
    pub fn sync_property(&self, name: &str, value: Value) -> Result<Value, WotHubError> {
        let mut state = self.state();
        let cell = state
            .properties
            .get_mut(name)
            .ok_or_else(|| NotFoundError::new("property", name))?;
        cell.sync(value)?;
        let stored = cell.value().clone();
        let mut values = serde_json::Map::new();
        values.insert(name.to_owned(), stored.clone());
        self.publish_values(values);
        Ok(stored)
    }

    /// Device-facing batch write. Unknown names and invalid values are
    /// dropped with a log line instead of failing the batch; all accepted
    /// values go out as one `propertyStatus`.
    ///
    /// Returns the values as stored.
    pub fn sync_properties(
        &self,
        values: serde_json::Map<String, Value>,
    ) -> serde_json::Map<String, Value> {
        let mut state = self.state();
        let mut accepted = serde_json::Map::new();
        for (name, value) in values {
            match state.properties.get_mut(&name) {
                None => {
                    tracing::warn!(thing = %self.id, property = %name, "ignoring sync for unknown property");
                }
                Some(cell) => match cell.sync(value) {
                    Ok(()) => {
                        accepted.insert(name, cell.value().clone());
                    }
                    Err(error) => {
                        tracing::warn!(thing = %self.id, property = %name, %error, "ignoring sync with invalid value");
                    }
                },
            }
        }
        if !accepted.is_empty() {
            self.publish_values(accepted.clone());
        }
        accepted
    }

    /// Accept a request for the named action.
    ///
    /// The record is queued and published as `created`, then the handler
    /// runs on its own task, moving the record through `pending` to
    /// `completed` or `failed` with a status published for each step.
    ///
    /// # Errors
    ///
    /// Fails when the action is not declared or the input does not satisfy
    /// the action's input schema. Nothing is queued in that case.
    pub fn perform_action(
        self: &Arc<Self>,
        name: &str,
        input: Option<Value>,
    ) -> Result<ActionRecord, WotHubError> {
        let template = self
            .actions
            .get(name)
            .ok_or_else(|| NotFoundError::new("action", name))?;
        if let Some(schema) = &template.input {
            schema.validate(input.as_ref().unwrap_or(&Value::Null))?;
        }
        let record = ActionRecord::new(name, input.clone());
        let action_id = record.id();
        {
            let mut state = self.state();
            state
                .instances
                .entry(name.to_owned())
                .or_default()
                .push(ActionInstance {
                    record: record.clone(),
                    task: None,
                });
            self.publish_action(record.clone());
        }
        let task = tokio::spawn(Self::run_action(
            Arc::clone(self),
            name.to_owned(),
            action_id,
            input,
        ));
        {
            let mut state = self.state();
            match Self::find_instance(&mut state, name, action_id) {
                Some(instance) => instance.task = Some(task),
                // Cancelled between spawn and here.
                None => task.abort(),
            }
        }
        Ok(record)
    }

    async fn run_action(self: Arc<Self>, name: String, action_id: ActionId, input: Option<Value>) {
        let Some(template) = self.actions.get(&name) else {
            return;
        };
        if !self.begin_action(&name, action_id) {
            // Cancelled before the handler started.
            return;
        }
        let context = ActionContext {
            thing: Arc::clone(&self),
            action_id,
            input,
        };
        let outcome = match template.timeout {
            Some(limit) => match tokio::time::timeout(limit, (template.handler)(context)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(HandlerError::TimedOut),
            },
            None => (template.handler)(context).await,
        };
        self.finish_action(&name, action_id, outcome);
    }

    fn find_instance<'a>(
        state: &'a mut ThingState,
        name: &str,
        action_id: ActionId,
    ) -> Option<&'a mut ActionInstance> {
        state
            .instances
            .get_mut(name)?
            .iter_mut()
            .find(|instance| instance.record.id() == action_id)
    }

    fn begin_action(&self, name: &str, action_id: ActionId) -> bool {
        let mut state = self.state();
        let Some(instance) = Self::find_instance(&mut state, name, action_id) else {
            return false;
        };
        instance.record.start();
        let record = instance.record.clone();
        self.publish_action(record);
        true
    }

    fn finish_action(&self, name: &str, action_id: ActionId, outcome: Result<(), HandlerError>) {
        let mut state = self.state();
        // Cancelled while the handler ran; nothing left to record.
        let Some(instance) = Self::find_instance(&mut state, name, action_id) else {
            return;
        };
        match outcome {
            Ok(()) => instance.record.complete(),
            Err(error) => instance.record.fail(error.to_string()),
        }
        instance.task = None;
        let record = instance.record.clone();
        self.publish_action(record);
    }

    /// One action request.
    ///
    /// # Errors
    ///
    /// Fails when no request with this id is queued under `name`.
    pub fn action(&self, name: &str, action_id: ActionId) -> Result<ActionRecord, WotHubError> {
        let mut state = self.state();
        Self::find_instance(&mut state, name, action_id)
            .map(|instance| instance.record.clone())
            .ok_or_else(|| NotFoundError::new("action request", action_id.to_string()).into())
    }

    /// All queued requests of one action, oldest first.
    ///
    /// # Errors
    ///
    /// Fails when the action is not declared.
    pub fn actions_of(&self, name: &str) -> Result<Vec<ActionRecord>, WotHubError> {
        if !self.actions.contains_key(name) {
            return Err(NotFoundError::new("action", name).into());
        }
        let state = self.state();
        Ok(state
            .instances
            .get(name)
            .map(|instances| {
                instances
                    .iter()
                    .map(|instance| instance.record.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Every queued request across all actions, ordered by request time.
    #[must_use]
    pub fn all_actions(&self) -> Vec<ActionRecord> {
        let state = self.state();
        let mut records: Vec<ActionRecord> = state
            .instances
            .values()
            .flat_map(|instances| instances.iter().map(|instance| instance.record.clone()))
            .collect();
        records.sort_by_key(ActionRecord::time_requested);
        records
    }

    /// Cancel a live request: abort its task, run the action's cancel hook,
    /// and drop the record.
    ///
    /// Returns `false` when the request is unknown or already terminal.
    /// Nothing is published; the request disappears as if never accepted.
    pub async fn cancel_action(&self, name: &str, action_id: ActionId) -> bool {
        let removed = {
            let mut state = self.state();
            let Some(instances) = state.instances.get_mut(name) else {
                return false;
            };
            let Some(position) = instances
                .iter()
                .position(|instance| instance.record.id() == action_id)
            else {
                return false;
            };
            if instances[position].record.status().is_terminal() {
                return false;
            }
            instances.remove(position)
        };
        if let Some(task) = removed.task {
            task.abort();
        }
        if let Some(cancel) = self.actions.get(name).and_then(|t| t.cancel.as_ref()) {
            if let Err(error) = cancel(action_id).await {
                tracing::warn!(thing = %self.id, action = name, %error, "cancel hook failed");
            }
        }
        true
    }

    /// Remove a request regardless of status, cancelling it first when it is
    /// still live. This is what `DELETE` on an action resource does.
    ///
    /// Returns `false` only when no such request exists.
    pub async fn remove_action(&self, name: &str, action_id: ActionId) -> bool {
        if self.cancel_action(name, action_id).await {
            return true;
        }
        let mut state = self.state();
        let Some(instances) = state.instances.get_mut(name) else {
            return false;
        };
        let Some(position) = instances
            .iter()
            .position(|instance| instance.record.id() == action_id)
        else {
            return false;
        };
        instances.remove(position);
        true
    }

    /// Record an occurrence of a declared event and publish it.
    ///
    /// The log keeps the most recent occurrences up to the thing's event
    /// capacity; older ones fall off the front.
    ///
    /// # Errors
    ///
    /// Fails when the event is not declared or the payload does not satisfy
    /// its schema.
    pub fn add_event(&self, name: &str, data: Option<Value>) -> Result<EventRecord, WotHubError> {
        let schema = self
            .events
            .get(name)
            .ok_or_else(|| NotFoundError::new("event", name))?;
        if let Some(data) = &data {
            schema.validate(data)?;
        }
        let record = EventRecord::new(name, data);
        let mut state = self.state();
        if state.event_capacity > 0 {
            if state.events.len() == state.event_capacity {
                state.events.pop_front();
            }
            state.events.push_back(record.clone());
        }
        self.publish_event(record.clone());
        Ok(record)
    }

    /// Retained occurrences of one event, oldest first.
    ///
    /// # Errors
    ///
    /// Fails when the event is not declared.
    pub fn events_of(&self, name: &str) -> Result<Vec<EventRecord>, WotHubError> {
        if !self.events.contains_key(name) {
            return Err(NotFoundError::new("event", name).into());
        }
        let state = self.state();
        Ok(state
            .events
            .iter()
            .filter(|record| record.name() == name)
            .cloned()
            .collect())
    }

    /// All retained occurrences, oldest first.
    #[must_use]
    pub fn all_events(&self) -> Vec<EventRecord> {
        let state = self.state();
        state.events.iter().cloned().collect()
    }

    /// Build the Thing Description from the current declarations.
    #[must_use]
    pub fn description(&self) -> ThingDescription {
        let base = self.href();
        let mut document = ThingDescription::new(self.id.clone(), self.title.clone());
        document.context.clone_from(&self.context);
        document.attype.clone_from(&self.attype);
        document.description.clone_from(&self.description);
        {
            let state = self.state();
            for (name, cell) in &state.properties {
                document.properties.insert(
                    name.clone(),
                    PropertyDescription {
                        schema: cell.schema().clone(),
                        links: vec![Link::new("property", format!("{base}/properties/{name}"))],
                    },
                );
            }
        }
        for (name, template) in &self.actions {
            document.actions.insert(
                name.clone(),
                ActionDescription {
                    title: template.title.clone(),
                    description: template.description.clone(),
                    input: template.input.clone(),
                    links: vec![Link::new("action", format!("{base}/actions/{name}"))],
                },
            );
        }
        for (name, schema) in &self.events {
            document.events.insert(
                name.clone(),
                EventDescription {
                    data: schema.clone(),
                    links: vec![Link::new("event", format!("{base}/events/{name}"))],
                },
            );
        }
        document.links = vec![
            Link::new("properties", format!("{base}/properties")),
            Link::new("actions", format!("{base}/actions")),
            Link::new("events", format!("{base}/events")),
        ];
        document
    }

    /// Abort every live action task. Called when the thing leaves the
    /// registry.
    pub fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut state = self.state();
            state
                .instances
                .values_mut()
                .flat_map(|instances| instances.iter_mut().filter_map(|i| i.task.take()))
                .collect()
        };
        for task in tasks {
            task.abort();
        }
    }
}

/// Collects declarations until [`build`](ThingBuilder::build) checks them
/// as a whole.
pub struct ThingBuilder {
    id: ThingId,
    title: String,
    context: String,
    attype: Vec<String>,
    description: Option<String>,
    properties: Vec<(String, DataSchema, Value)>,
    write_hooks: HashMap<String, WriteHook>,
    actions: Vec<(String, ActionTemplate)>,
    events: Vec<(String, DataSchema)>,
    event_capacity: usize,
}

impl ThingBuilder {
    /// Override the JSON-LD context.
    #[must_use]
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Add one semantic `@type` annotation.
    #[must_use]
    pub fn attype(mut self, attype: impl Into<String>) -> Self {
        self.attype.push(attype.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a property with its schema and starting value.
    #[must_use]
    pub fn property(
        mut self,
        name: impl Into<String>,
        schema: DataSchema,
        initial: Value,
    ) -> Self {
        self.properties.push((name.into(), schema, initial));
        self
    }

    /// Forwarder run after every client-facing write to `name`, with the
    /// property name and the stored value. Device integrations use this to
    /// push the write out to the real device.
    #[must_use]
    pub fn on_write<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.write_hooks.insert(
            name.into(),
            Arc::new(move |name, value| Box::pin(hook(name, value))),
        );
        self
    }

    /// Declare an action.
    #[must_use]
    pub fn action(mut self, name: impl Into<String>, template: ActionTemplate) -> Self {
        self.actions.push((name.into(), template));
        self
    }

    /// Declare an event with the schema of its payload. Use
    /// `DataSchema::default()` for events without one.
    #[must_use]
    pub fn event(mut self, name: impl Into<String>, data: DataSchema) -> Self {
        self.events.push((name.into(), data));
        self
    }

    /// How many event occurrences to retain.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check all declarations and produce the thing.
    ///
    /// # Errors
    ///
    /// Fails on an empty id or title, duplicate property/action/event names,
    /// an initial value violating its schema, or a write hook naming an
    /// undeclared property.
    pub fn build(self, bus: Arc<NotificationBus>) -> Result<Arc<Thing>, WotHubError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }
        let mut properties = BTreeMap::new();
        for (name, schema, initial) in self.properties {
            if properties.contains_key(&name) {
                return Err(ValidationError::DuplicateName {
                    kind: "property",
                    name,
                }
                .into());
            }
            let cell = PropertyCell::new(name.clone(), schema, initial)?;
            properties.insert(name, cell);
        }
        for name in self.write_hooks.keys() {
            if !properties.contains_key(name) {
                return Err(NotFoundError::new("property", name.clone()).into());
            }
        }
        let mut actions = HashMap::new();
        for (name, template) in self.actions {
            if actions.contains_key(&name) {
                return Err(ValidationError::DuplicateName {
                    kind: "action",
                    name,
                }
                .into());
            }
            actions.insert(name, template);
        }
        let mut events = HashMap::new();
        for (name, schema) in self.events {
            if events.contains_key(&name) {
                return Err(ValidationError::DuplicateName {
                    kind: "event",
                    name,
                }
                .into());
            }
            events.insert(name, schema);
        }
        Ok(Arc::new(Thing {
            id: self.id,
            title: self.title,
            context: self.context,
            attype: self.attype,
            description: self.description,
            bus,
            actions,
            events,
            write_hooks: self.write_hooks,
            state: Mutex::new(ThingState {
                properties,
                instances: HashMap::new(),
                events: VecDeque::new(),
                event_capacity: self.event_capacity,
            }),
        }))
    }
}
