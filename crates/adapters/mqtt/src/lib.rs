//! MQTT protocol binding.
//!
//! Mirrors registered things onto an MQTT broker: request envelopes arrive
//! on `<base>/things/<id>/request` and run through the shared dispatch
//! path; state, event and error notifications go out on the matching
//! per-thing topics.
//!
//! ## Responsibilities
//!
//! - Topic layout under one configurable base prefix
//! - Inbound request handling, errors answered on the thing's error topic
//! - Outbound fan-out of bus notifications to the broker
//!
//! ## Dependency rule
//!
//! Depends on `wothub-domain` and `wothub-app` plus the `rumqttc` client.
//! Nothing in the runtime depends back on this crate.

pub mod bridge;
pub mod config;
pub mod error;
pub mod topics;
