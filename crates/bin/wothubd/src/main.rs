//! # wothubd — wothub daemon
//!
//! Composition root that wires the runtime and protocol bindings together
//! and starts the hub.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Construct the notification bus, thing registry and rule engine
//! - Run providers and register the things they contribute
//! - Load automation rules from configuration
//! - Start the MQTT bridge when enabled
//! - Build the axum router (REST + WebSocket), bind and serve
//! - Handle graceful shutdown (SIGINT/SIGTERM)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wothub_adapter_http_axum::state::AppState;
use wothub_adapter_mqtt::bridge::MqttBridge;
use wothub_adapter_virtual::VirtualProvider;
use wothub_app::bus::NotificationBus;
use wothub_app::provider::ThingProvider;
use wothub_app::registry::ThingRegistry;
use wothub_app::rules::RuleEngine;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.logging.filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Runtime core
    let bus = Arc::new(NotificationBus::new());
    let registry = Arc::new(ThingRegistry::new(Arc::clone(&bus)));
    let engine = RuleEngine::new(Arc::clone(&registry));

    // Providers
    let mut virtual_provider = config
        .things
        .virtual_enabled
        .then(|| VirtualProvider::new(config.things.event_capacity));
    if let Some(provider) = virtual_provider.as_mut() {
        for thing in provider.setup(Arc::clone(&bus)).await? {
            tracing::info!(provider = provider.name(), thing = %thing.id(), "thing registered");
            registry.add(thing)?;
        }
    }

    let bind_addr = config.bind_addr();

    // Rules
    for rule in config.rules {
        let name = rule.name.clone();
        let rule_id = engine.load_rule(rule)?;
        tracing::info!(rule = %name, id = %rule_id, "rule loaded");
    }

    // MQTT bridge
    let bridge = if config.mqtt.enabled {
        Some(MqttBridge::start(&config.mqtt.connection, Arc::clone(&registry)).await?)
    } else {
        None
    };

    // HTTP + WebSocket
    let app = wothub_adapter_http_axum::router::build(AppState::new(Arc::clone(&registry)))
        .merge(wothub_adapter_ws::router::routes(Arc::clone(&registry)));

    tracing::info!(addr = %bind_addr, "wothubd listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Teardown in reverse order of construction
    if let Some(bridge) = bridge {
        bridge.shutdown().await;
    }
    if let Some(provider) = virtual_provider.as_mut() {
        if let Err(error) = provider.teardown().await {
            tracing::warn!(%error, "provider teardown failed");
        }
    }
    for id in registry.ids() {
        registry.remove(&id);
    }
    engine.shutdown();

    Ok(())
}

/// Resolve once the process receives ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(error) => {
                tracing::warn!(%error, "unable to listen for ctrl-c");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "unable to listen for SIGTERM");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutting down");
}
