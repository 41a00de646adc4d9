//! # wothub-adapter-ws
//!
//! WebSocket adapter built on axum's `ws` support.
//!
//! ## Responsibilities
//! - Upgrade `GET /things/{id}/ws` into a per-thing connection
//! - Forward `state` and `error` notifications to the socket as envelopes;
//!   forward `event` notifications the connection asked for via
//!   `addEventSubscription`
//! - Parse inbound frames and dispatch them through the runtime
//! - Answer malformed or failing requests on the sending connection only
//!
//! ## Dependency rule
//! Depends on `wothub-app` (dispatch, bus, registry) and `wothub-domain`
//! (envelopes and errors). Never leaks axum types into the domain.

pub mod connection;
pub mod router;
