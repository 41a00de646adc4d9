//! MQTT bridge error types.

/// Errors raised while standing up or tearing down the bridge. Runtime
/// failures (lost connections, rejected publishes) are logged and retried
/// instead of surfaced here.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The rumqttc client rejected a request.
    #[error("MQTT client error")]
    Client(#[from] rumqttc::ClientError),
}
