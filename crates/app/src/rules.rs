//! Rule engine — watches property notifications, fires conclusions.
//!
//! Premise matching happens inside bus callbacks, which run on the
//! publishing thing's thread while that thing holds its state lock.
//! Conclusions therefore never execute there: matching only pushes a firing
//! onto a queue, and a dedicated executor task applies the conclusions
//! through the registry. Rules re-evaluate on every notification that
//! touches a watched property, so an unchanged value arriving again
//! re-fires a matching rule; consumers that want edge triggering put the
//! edge into the premise value.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use wothub_domain::error::{ValidationError, WotHubError};
use wothub_domain::id::{RuleId, SubscriptionId, ThingId};
use wothub_domain::rule::{Combinator, Conclusion, Effect, Premise, Rule};

use crate::bus::{Notification, Topic};
use crate::dispatch::status_line;
use crate::registry::ThingRegistry;

/// Key of one watched property.
type PremiseKey = (ThingId, String);

struct Observation {
    last_seen: Option<Value>,
    watchers: usize,
}

struct ThingSubscription {
    id: SubscriptionId,
    rules: usize,
}

#[derive(Default)]
struct Tables {
    rules: HashMap<RuleId, Rule>,
    observations: HashMap<PremiseKey, Observation>,
    premise_index: HashMap<PremiseKey, Vec<RuleId>>,
    subscriptions: HashMap<ThingId, ThingSubscription>,
}

struct Firing {
    rule_name: String,
    conclusions: Vec<Conclusion>,
}

/// Matches rules against property notifications and executes their
/// conclusions on a separate task.
pub struct RuleEngine {
    registry: Arc<ThingRegistry>,
    tables: Arc<Mutex<Tables>>,
    firings: mpsc::UnboundedSender<Firing>,
    executor: Mutex<Option<JoinHandle<()>>>,
}

impl RuleEngine {
    /// Create the engine and start its executor task.
    #[must_use]
    pub fn new(registry: Arc<ThingRegistry>) -> Self {
        let (firings, queue) = mpsc::unbounded_channel();
        let executor = tokio::spawn(Self::run_executor(Arc::clone(&registry), queue));
        Self {
            registry,
            tables: Arc::new(Mutex::new(Tables::default())),
            firings,
            executor: Mutex::new(Some(executor)),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load a rule and start watching its premises.
    ///
    /// Observations are seeded from the current property values, so a
    /// premise that already holds counts as matched the next time any
    /// watched property of the rule publishes. Premises may name things
    /// that are not registered yet; they match once the thing exists and
    /// publishes.
    ///
    /// # Errors
    ///
    /// Fails when the rule is structurally invalid or already loaded.
    pub fn load_rule(&self, rule: Rule) -> Result<RuleId, WotHubError> {
        rule.validate()?;

        // Snapshot current values before taking the tables lock; reading a
        // property takes the thing's state lock, which must never be
        // acquired while the tables are held.
        let mut seeds: Vec<(PremiseKey, Option<Value>)> = Vec::new();
        for premise in &rule.premises {
            let seen = self
                .registry
                .get(&premise.thing_id)
                .ok()
                .and_then(|thing| thing.read_property(&premise.property).ok());
            seeds.push((
                (premise.thing_id.clone(), premise.property.clone()),
                seen,
            ));
        }

        let rule_id = rule.id;
        let mut tables = self.tables();
        if tables.rules.contains_key(&rule_id) {
            return Err(ValidationError::DuplicateName {
                kind: "rule",
                name: rule.name,
            }
            .into());
        }

        for (key, seed) in seeds {
            let observation = tables
                .observations
                .entry(key.clone())
                .or_insert(Observation {
                    last_seen: None,
                    watchers: 0,
                });
            observation.watchers += 1;
            if observation.last_seen.is_none() {
                observation.last_seen = seed;
            }

            let watching = tables.premise_index.entry(key.clone()).or_default();
            if !watching.contains(&rule_id) {
                watching.push(rule_id);
            }

            let (thing_id, _) = key;
            match tables.subscriptions.get_mut(&thing_id) {
                Some(subscription) => subscription.rules += 1,
                None => {
                    let id = self.subscribe_to(thing_id.clone());
                    tables
                        .subscriptions
                        .insert(thing_id, ThingSubscription { id, rules: 1 });
                }
            }
        }

        tables.rules.insert(rule_id, rule);
        Ok(rule_id)
    }

    fn subscribe_to(&self, thing_id: ThingId) -> SubscriptionId {
        let tables = Arc::clone(&self.tables);
        let firings = self.firings.clone();
        self.registry
            .bus()
            .subscribe(Topic::state(thing_id), move |notification| {
                if let Notification::PropertyStatus { thing_id, values } = notification {
                    Self::on_property_status(&tables, &firings, thing_id, values);
                }
                Ok(())
            })
    }

    fn on_property_status(
        tables: &Mutex<Tables>,
        firings: &mpsc::UnboundedSender<Firing>,
        thing_id: &ThingId,
        values: &serde_json::Map<String, Value>,
    ) {
        let mut tables = tables.lock().unwrap_or_else(PoisonError::into_inner);
        let mut affected: Vec<RuleId> = Vec::new();
        for (property, value) in values {
            let key = (thing_id.clone(), property.clone());
            let Some(observation) = tables.observations.get_mut(&key) else {
                continue;
            };
            observation.last_seen = Some(value.clone());
            if let Some(watching) = tables.premise_index.get(&key) {
                for rule_id in watching {
                    if !affected.contains(rule_id) {
                        affected.push(*rule_id);
                    }
                }
            }
        }

        for rule_id in affected {
            let Some(rule) = tables.rules.get(&rule_id) else {
                continue;
            };
            if !rule.enabled || !Self::premises_hold(&tables, rule) {
                continue;
            }
            tracing::debug!(rule = %rule.name, "rule fired");
            // The executor is gone only after shutdown; drop the firing then.
            let _ = firings.send(Firing {
                rule_name: rule.name.clone(),
                conclusions: rule.conclusions.clone(),
            });
        }
    }

    fn premises_hold(tables: &Tables, rule: &Rule) -> bool {
        let matched = |premise: &Premise| {
            tables
                .observations
                .get(&(premise.thing_id.clone(), premise.property.clone()))
                .and_then(|observation| observation.last_seen.as_ref())
                .is_some_and(|seen| premise.op.evaluate(seen, &premise.value))
        };
        match rule.combinator {
            Combinator::And => rule.premises.iter().all(matched),
            Combinator::Or => rule.premises.iter().any(matched),
        }
    }

    async fn run_executor(
        registry: Arc<ThingRegistry>,
        mut queue: mpsc::UnboundedReceiver<Firing>,
    ) {
        while let Some(firing) = queue.recv().await {
            for conclusion in firing.conclusions {
                if let Err(error) = Self::execute(&registry, &conclusion).await {
                    tracing::warn!(
                        rule = %firing.rule_name,
                        thing = %conclusion.thing_id,
                        %error,
                        "rule conclusion failed"
                    );
                    registry.bus().publish(&Notification::Error {
                        thing_id: conclusion.thing_id.clone(),
                        status: status_line(&error).to_owned(),
                        message: error.detail(),
                    });
                }
            }
        }
    }

    async fn execute(
        registry: &ThingRegistry,
        conclusion: &Conclusion,
    ) -> Result<(), WotHubError> {
        let thing = registry.get(&conclusion.thing_id)?;
        match &conclusion.effect {
            Effect::SetProperty { property, value } => {
                thing.write_property(property, value.clone()).await?;
            }
            Effect::RequestAction { action, input } => {
                thing.perform_action(action, input.clone())?;
            }
        }
        Ok(())
    }

    /// Unload a rule and stop watching premises nothing else watches.
    /// Returns `false` when the id is unknown.
    pub fn remove_rule(&self, rule_id: RuleId) -> bool {
        let mut tables = self.tables();
        let Some(rule) = tables.rules.remove(&rule_id) else {
            return false;
        };
        for premise in &rule.premises {
            let key = (premise.thing_id.clone(), premise.property.clone());
            if let Some(observation) = tables.observations.get_mut(&key) {
                observation.watchers -= 1;
                if observation.watchers == 0 {
                    tables.observations.remove(&key);
                }
            }
            if let Some(watching) = tables.premise_index.get_mut(&key) {
                watching.retain(|id| *id != rule_id);
                if watching.is_empty() {
                    tables.premise_index.remove(&key);
                }
            }
            if let Some(subscription) = tables.subscriptions.get_mut(&premise.thing_id) {
                subscription.rules -= 1;
                if subscription.rules == 0 {
                    self.registry.bus().unsubscribe(subscription.id);
                    tables.subscriptions.remove(&premise.thing_id);
                }
            }
        }
        true
    }

    /// Enable or disable a rule without unloading it. Returns `false` when
    /// the id is unknown.
    pub fn set_enabled(&self, rule_id: RuleId, enabled: bool) -> bool {
        let mut tables = self.tables();
        match tables.rules.get_mut(&rule_id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Snapshot of the loaded rules.
    #[must_use]
    pub fn rules(&self) -> Vec<Rule> {
        let tables = self.tables();
        let mut rules: Vec<Rule> = tables.rules.values().cloned().collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        rules
    }

    /// Drop every rule and stop the executor.
    pub fn shutdown(&self) {
        let mut tables = self.tables();
        for subscription in tables.subscriptions.values() {
            self.registry.bus().unsubscribe(subscription.id);
        }
        *tables = Tables::default();
        drop(tables);
        let executor = self
            .executor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(executor) = executor {
            executor.abort();
        }
    }
}
