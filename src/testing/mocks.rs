//! Mock implementations for testing
//!
//! Provides a mock [`Transport`] that records published messages and
//! lifecycle calls, enabling session tests without a broker.

use crate::transport::mqtt::ConnectionState;
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

pub type PublishedMessage = (String, Vec<u8>);

/// Error type for the mock transport
#[derive(Debug, Error)]
#[error("Mock transport failure: {0}")]
pub struct MockTransportError(pub String);

/// Mock transport recording every publish and lifecycle call
#[derive(Debug, Default)]
pub struct MockTransport {
    published: Arc<Mutex<Vec<PublishedMessage>>>,
    state: Arc<Mutex<Option<ConnectionState>>>,
    shutdown_calls: Arc<Mutex<u32>>,
    should_fail: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose operations all fail
    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// A transport that reports the given connection state
    pub async fn set_state(&self, state: ConnectionState) {
        *self.state.lock().await = Some(state);
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }

    pub async fn shutdown_calls(&self) -> u32 {
        *self.shutdown_calls.lock().await
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn start(&mut self) -> Result<(), Self::Error> {
        if self.should_fail {
            return Err(MockTransportError("start failed".to_string()));
        }
        *self.state.lock().await = Some(ConnectionState::Connecting);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        if self.should_fail {
            return Err(MockTransportError("publish failed".to_string()));
        }
        self.published
            .lock()
            .await
            .push((topic.to_string(), payload));
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Self::Error> {
        // Teardown never fails, whatever the connection state
        *self.shutdown_calls.lock().await += 1;
        *self.state.lock().await = Some(ConnectionState::Disconnected(
            "mock shutdown".to_string(),
        ));
        Ok(())
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        self.state.try_lock().ok().and_then(|guard| guard.clone())
    }
}
