//! Epicure command publisher
//!
//! An interactive MQTT command publisher for Epicure Robotics controllers:
//! every non-empty line typed at the terminal is published verbatim to a
//! fixed topic, while a background task keeps the broker connection alive
//! and reconnects with bounded exponential backoff.
//!
//! # Quick start
//!
//! ```no_run
//! use epicure_publisher::config::PublisherConfig;
//! use epicure_publisher::session::CommandSession;
//! use epicure_publisher::transport::mqtt::MqttPublisher;
//! use epicure_publisher::transport::Transport;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PublisherConfig::default();
//! let mut transport = MqttPublisher::new(&config.mqtt, &config.publisher.client_id_prefix);
//! Transport::start(&mut transport).await?;
//!
//! let session = CommandSession::new(transport, config.publisher.topic);
//! session.dispatch("led:on").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod testing;
pub mod transport;

pub use config::PublisherConfig;
pub use error::{PublisherError, PublisherResult};
pub use session::CommandSession;
pub use transport::mqtt::MqttPublisher;
pub use transport::Transport;
