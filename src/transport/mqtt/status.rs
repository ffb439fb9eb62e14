//! Pure event routing and operator-facing status notices
//!
//! The connect/disconnect hooks are plain functions producing the status
//! lines the operator sees; the network-service task invokes them on state
//! transitions and does nothing else with them. No retry or queueing logic
//! lives here.

use rumqttc::{ConnectReturnCode, ConnectionError, Event, Packet};

/// Connection transitions worth reporting to the operator
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionTransition {
    /// Broker accepted the connection attempt
    Accepted,
    /// Broker refused the connection attempt with a return code
    Refused(ConnectReturnCode),
}

/// Pure routing and formatting for connection status
pub struct StatusHandler;

impl StatusHandler {
    /// Route an MQTT event to a reportable transition, if any. Pings,
    /// acks, and outgoing packets are not the operator's concern.
    ///
    /// A ConnAck that arrives as an event was accepted: the client library
    /// surfaces refused CONNACKs as connection errors, never as events
    /// (see [`Self::route_error`]).
    pub fn route_event(event: &Event) -> Option<ConnectionTransition> {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => Some(ConnectionTransition::Accepted),
            _ => None,
        }
    }

    /// Route a poll error to a reportable transition, if any. A refused
    /// CONNACK comes out of the event loop as `ConnectionRefused`; every
    /// other error is a network-level drop, reported by the caller.
    pub fn route_error(error: &ConnectionError) -> Option<ConnectionTransition> {
        match error {
            ConnectionError::ConnectionRefused(code) => {
                Some(ConnectionTransition::Refused(*code))
            }
            _ => None,
        }
    }

    /// Numeric return code as the MQTT 3.1.1 wire value, matching what the
    /// broker actually sent
    pub fn return_code_value(code: ConnectReturnCode) -> u8 {
        match code {
            ConnectReturnCode::Success => 0,
            ConnectReturnCode::RefusedProtocolVersion => 1,
            ConnectReturnCode::BadClientId => 2,
            ConnectReturnCode::ServiceUnavailable => 3,
            ConnectReturnCode::BadUserNamePassword => 4,
            ConnectReturnCode::NotAuthorized => 5,
        }
    }

    /// Status line for an accepted connection
    pub fn connected_notice(broker_host: &str) -> String {
        format!("Successfully connected to MQTT broker at {broker_host}")
    }

    /// Status line for a refused connection, carrying the return code
    pub fn refused_notice(code: ConnectReturnCode) -> String {
        format!(
            "Failed to connect, return code {}",
            Self::return_code_value(code)
        )
    }

    /// Status line for a lost connection. Reconnection is the background
    /// task's job; this only reports it.
    pub fn disconnected_notice(reason: &str) -> String {
        format!("Disconnected from MQTT broker: {reason}. Reconnecting...")
    }
}
