//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `wothub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values; `WOTHUB_MQTT_BROKER` both enables the
//! MQTT bridge and points it at `host[:port]`.
//!
//! Automation rules can be declared inline as `[[rules]]` tables and are
//! loaded into the rule engine at boot.

use serde::Deserialize;

use wothub_adapter_mqtt::config::MqttConfig;
use wothub_app::thing::DEFAULT_EVENT_CAPACITY;
use wothub_domain::rule::Rule;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// MQTT bridge settings.
    pub mqtt: MqttSection,
    /// Thing runtime settings.
    pub things: ThingsConfig,
    /// Automation rules loaded at boot.
    pub rules: Vec<Rule>,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// MQTT bridge configuration — connection settings plus an on/off switch.
///
/// The connection fields live at the same level as `enabled`, so a config
/// file reads naturally:
///
/// ```toml
/// [mqtt]
/// enabled = true
/// broker_host = "broker.local"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MqttSection {
    /// Start the MQTT bridge.
    pub enabled: bool,
    /// Broker connection settings, passed through to the adapter.
    #[serde(flatten)]
    pub connection: MqttConfig,
}

/// Thing runtime settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ThingsConfig {
    /// Register the virtual/demo things.
    pub virtual_enabled: bool,
    /// Event occurrences kept per event name before old ones are dropped.
    pub event_capacity: usize,
}

impl Config {
    /// Load configuration from `wothub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if
    /// the resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("wothub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("WOTHUB_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("WOTHUB_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("WOTHUB_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("WOTHUB_MQTT_BROKER") {
            self.mqtt.enabled = true;
            match val.rsplit_once(':') {
                Some((host, port)) => {
                    self.mqtt.connection.broker_host = host.to_string();
                    if let Ok(port) = port.parse() {
                        self.mqtt.connection.broker_port = port;
                    }
                }
                None => self.mqtt.connection.broker_host = val,
            }
        }
        if let Ok(val) = std::env::var("WOTHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.mqtt.enabled && self.mqtt.connection.broker_port == 0 {
            return Err(ConfigError::Validation(
                "mqtt broker port must be non-zero".to_string(),
            ));
        }
        if self.things.event_capacity == 0 {
            return Err(ConfigError::Validation(
                "event capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "wothubd=info,wothub=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for ThingsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use wothub_domain::rule::{ComparisonOp, Effect};

    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert!(!config.mqtt.enabled);
        assert_eq!(config.mqtt.connection.broker_host, "localhost");
        assert!(config.things.virtual_enabled);
        assert_eq!(config.things.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let toml = "";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [logging]
            filter = 'debug'

            [mqtt]
            enabled = true
            broker_host = 'broker.local'
            broker_port = 1884
            base_topic = 'home'

            [things]
            virtual_enabled = false
            event_capacity = 32
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.logging.filter, "debug");
        assert!(config.mqtt.enabled);
        assert_eq!(config.mqtt.connection.broker_host, "broker.local");
        assert_eq!(config.mqtt.connection.broker_port, 1884);
        assert_eq!(config.mqtt.connection.base_topic, "home");
        assert!(!config.things.virtual_enabled);
        assert_eq!(config.things.event_capacity, 32);
    }

    #[test]
    fn should_parse_rules_from_toml() {
        let toml = "
            [[rules]]
            name = 'cool down'

            [[rules.premises]]
            thing = 'virtual-sensor'
            property = 'temperature'
            op = 'gt'
            value = 28.0

            [[rules.conclusions]]
            thing = 'virtual-lamp'
            effect = 'setProperty'
            property = 'on'
            value = false
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.rules.len(), 1);
        let rule = &config.rules[0];
        assert_eq!(rule.name, "cool down");
        assert!(rule.enabled);
        assert_eq!(rule.premises[0].op, ComparisonOp::Gt);
        assert_eq!(rule.conclusions[0].thing_id.as_str(), "virtual-lamp");
        assert!(matches!(
            rule.conclusions[0].effect,
            Effect::SetProperty { .. }
        ));
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_defaults_as_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_reject_zero_mqtt_port_when_bridge_enabled() {
        let mut config = Config::default();
        config.mqtt.enabled = true;
        config.mqtt.connection.broker_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_ignore_mqtt_port_when_bridge_disabled() {
        let mut config = Config::default();
        config.mqtt.connection.broker_port = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_reject_zero_event_capacity() {
        let mut config = Config::default();
        config.things.event_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_format_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn should_format_custom_bind_addr() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9090;
        assert_eq!(config.bind_addr(), "127.0.0.1:9090");
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [server]
            port = 8080
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.things.virtual_enabled);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
