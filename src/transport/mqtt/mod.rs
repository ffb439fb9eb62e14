//! MQTT transport implementation
//!
//! Split by purity: `connection` holds configuration and state types,
//! `status` the event routing and operator notices, and `client` the
//! impure rumqttc I/O.

mod client;
mod connection;
mod status;

pub use client::MqttPublisher;
pub use connection::{configure_mqtt_options, ConnectionState, MqttError, ReconnectConfig};
pub use status::{ConnectionTransition, StatusHandler};
