//! # wothub-app
//!
//! Runtime core — the living counterpart to `wothub-domain`'s passive data.
//!
//! ## Responsibilities
//! - **Thing** — the runtime aggregate owning property values, action queues,
//!   and event logs, publishing every change on the bus
//! - **NotificationBus** — synchronous per-topic fan-out connecting things to
//!   protocol bindings and the rule engine
//! - **ThingRegistry** — the single live index of things by id
//! - **RuleEngine** — premise matching over property notifications, with
//!   conclusions executed on a separate task
//! - **dispatch** — mapping incoming request envelopes onto thing operations
//! - **ThingProvider** — the port integrations implement to contribute things
//!
//! ## Dependency rule
//! Depends on `wothub-domain` plus `tokio` (tasks, channels). Never imports
//! binding crates; bindings depend on *this* crate, not the reverse.

pub mod bus;
pub mod dispatch;
pub mod provider;
pub mod registry;
pub mod rules;
pub mod thing;
