//! Configuration for the command publisher
//!
//! All settings ship with compiled-in defaults matching the Epicure
//! deployment (public HiveMQ broker, `epicure/commands` topic). An optional
//! TOML file can override them; there are no command-line flags and no
//! environment-variable lookups for configuration values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default config file locations, checked in order.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["publisher.toml", "config/publisher.toml"];

/// Top-level publisher configuration. Immutable for the process lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PublisherConfig {
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub publisher: PublisherSection,
}

/// Broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker hostname or IP address
    #[serde(default = "default_broker_host")]
    pub broker_host: String,
    /// Broker TCP port
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,
    /// Keepalive ping interval in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Minimum reconnect backoff delay in seconds
    #[serde(default = "default_reconnect_min_secs")]
    pub reconnect_min_secs: u64,
    /// Maximum reconnect backoff delay in seconds
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,
}

/// Publisher-side settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublisherSection {
    /// Topic every command line is published to
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Prefix for the generated MQTT client id
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
}

fn default_broker_host() -> String {
    "broker.hivemq.com".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_keepalive_secs() -> u64 {
    60
}

fn default_reconnect_min_secs() -> u64 {
    1
}

fn default_reconnect_max_secs() -> u64 {
    120
}

fn default_topic() -> String {
    "epicure/commands".to_string()
}

fn default_client_id_prefix() -> String {
    "epicure-publisher".to_string()
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            broker_host: default_broker_host(),
            broker_port: default_broker_port(),
            keepalive_secs: default_keepalive_secs(),
            reconnect_min_secs: default_reconnect_min_secs(),
            reconnect_max_secs: default_reconnect_max_secs(),
        }
    }
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            client_id_prefix: default_client_id_prefix(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid topic '{0}': must be non-empty and contain no wildcards")]
    InvalidTopic(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PublisherConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: PublisherConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the first existing default location, or fall back to
    /// compiled-in defaults when no file is present.
    pub fn load_default() -> Result<Self, ConfigError> {
        for path_str in DEFAULT_CONFIG_PATHS {
            let path = Path::new(path_str);
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                return Self::load_from_file(path);
            }
        }
        Ok(Self::default())
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_topic(&self.publisher.topic)?;

        if self.mqtt.broker_host.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "broker_host must not be empty".to_string(),
            ));
        }
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::InvalidConfig(
                "broker_port must not be 0".to_string(),
            ));
        }
        // rumqttc rejects keepalives shorter than 5 seconds
        if self.mqtt.keepalive_secs < 5 {
            return Err(ConfigError::InvalidConfig(format!(
                "keepalive_secs must be at least 5, got {}",
                self.mqtt.keepalive_secs
            )));
        }
        if self.mqtt.reconnect_min_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "reconnect_min_secs must be greater than 0".to_string(),
            ));
        }
        if self.mqtt.reconnect_max_secs < self.mqtt.reconnect_min_secs {
            return Err(ConfigError::InvalidConfig(format!(
                "reconnect_max_secs ({}) must be >= reconnect_min_secs ({})",
                self.mqtt.reconnect_max_secs, self.mqtt.reconnect_min_secs
            )));
        }
        Ok(())
    }
}

/// Validate a publish topic: non-empty and free of subscription wildcards.
fn validate_topic(topic: &str) -> Result<(), ConfigError> {
    if topic.is_empty() || topic.contains('+') || topic.contains('#') {
        return Err(ConfigError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}
