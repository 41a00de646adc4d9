//! Shared application state for axum handlers.

use std::sync::Arc;

use wothub_app::registry::ThingRegistry;

/// Application state shared across all axum handlers.
///
/// Cloning is cheap: only the `Arc` handle is copied, the registry itself is
/// shared.
#[derive(Clone)]
pub struct AppState {
    /// Registry of every exposed thing.
    pub registry: Arc<ThingRegistry>,
}

impl AppState {
    /// Create the handler state around a shared registry.
    #[must_use]
    pub fn new(registry: Arc<ThingRegistry>) -> Self {
        Self { registry }
    }
}
