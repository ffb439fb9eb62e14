//! Transport layer for command publishing
//!
//! Provides a transport abstraction over the MQTT implementation so the
//! interactive session can be exercised against a mock in tests.

pub mod mqtt;

use mqtt::ConnectionState;

/// Transport trait for the command publisher
///
/// Abstracts the broker connection to enable dependency injection and
/// testing. The sole production implementation is [`mqtt::MqttPublisher`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start the background network-service task. Does not wait for the
    /// broker to accept the connection; failures are retried internally.
    async fn start(&mut self) -> Result<(), Self::Error>;

    /// Hand one payload to the send queue for the given topic. Returns as
    /// soon as the message is queued; no delivery acknowledgment is awaited.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error>;

    /// Stop the background task and close the connection. Must be safe to
    /// call whatever the connection state, including never-connected.
    async fn shutdown(&mut self) -> Result<(), Self::Error>;

    /// Current connection state, or None before `start()` was called
    fn connection_state(&self) -> Option<ConnectionState>;

    /// Check if the transport is currently connected
    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), Some(ConnectionState::Connected))
    }
}
