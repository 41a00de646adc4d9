//! # wothub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve Thing Descriptions and the per-thing REST surface
//!   (`/things`, `/things/{id}/properties/{name}`, `/things/{id}/actions`, …)
//! - Map HTTP requests into registry and thing operations (driving adapter)
//! - Map runtime errors into HTTP responses (400, 404, 500)
//!
//! ## Dependency rule
//! Depends on `wothub-app` (for the registry and thing runtime) and
//! `wothub-domain` (for descriptions and errors). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
