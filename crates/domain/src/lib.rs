//! # wothub-domain
//!
//! Pure domain model for the wothub Web-of-Things runtime.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **property schemas** and value validation
//! - Define **action records** (lifecycle-tracked invocations)
//! - Define **event records** (immutable occurrences)
//! - Define **thing descriptions** (the serialised interface of a Thing)
//! - Define **rules** (premise → conclusion automation)
//! - Define the **wire envelope** shared by the WebSocket and MQTT bindings
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! The runtime aggregate (`Thing`) lives in the `app` crate because it spawns
//! tasks; everything here is passive data plus invariant checks.

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod description;
pub mod envelope;
pub mod event;
pub mod property;
pub mod rule;
pub mod schema;
