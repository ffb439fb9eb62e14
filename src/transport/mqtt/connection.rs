//! Pure connection state management for the MQTT publisher
//!
//! Contains the connection state type, the reconnect backoff policy, and
//! MQTT option construction. Nothing in this module touches the network.

use crate::config::MqttSection;
use rumqttc::MqttOptions;
use std::time::Duration;
use thiserror::Error;

/// Connection state as observed by the network-service task
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Attempting to connect (initially or between retries)
    Connecting,
    /// Broker accepted the connection
    Connected,
    /// Connection lost or refused, with reason
    Disconnected(String),
}

/// Reconnection backoff policy: exponential doubling bounded by
/// a minimum and maximum delay. Retries are unlimited.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
        }
    }
}

impl ReconnectConfig {
    pub fn from_config(config: &MqttSection) -> Self {
        Self {
            min_delay: Duration::from_secs(config.reconnect_min_secs),
            max_delay: Duration::from_secs(config.reconnect_max_secs),
        }
    }

    /// Delay to use for the first retry after a drop.
    pub fn first_delay(&self) -> Duration {
        self.min_delay
    }

    /// Delay to use after `current` has elapsed without a successful
    /// connection: doubled, capped at the maximum.
    pub fn next_delay(&self, current: Duration) -> Duration {
        (current * 2).min(self.max_delay)
    }
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Publishing failed")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Network service task already started")]
    AlreadyStarted,
}

/// Build MQTT options from configuration.
///
/// The client id carries a millisecond timestamp so repeated runs against
/// the same broker never collide.
pub fn configure_mqtt_options(config: &MqttSection, client_id_prefix: &str) -> MqttOptions {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let client_id = format!("{client_id_prefix}-{timestamp}");

    let mut mqtt_options = MqttOptions::new(client_id, &config.broker_host, config.broker_port);
    mqtt_options.set_keep_alive(Duration::from_secs(config.keepalive_secs));
    mqtt_options.set_clean_session(true);
    mqtt_options
}
