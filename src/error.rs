//! Crate-level error types for the command publisher

use thiserror::Error;

/// Main error type for publisher operations
#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Input error: {0}")]
    Input(#[from] std::io::Error),
}

impl PublisherError {
    /// Wrap a transport-layer error
    pub fn transport<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Transport(Box::new(err))
    }
}

/// Result type for publisher operations
pub type PublisherResult<T> = Result<T, PublisherError>;
