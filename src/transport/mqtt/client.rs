//! Impure I/O for the MQTT publisher
//!
//! Owns the rumqttc client and the background network-service task. The
//! task polls the event loop for the process lifetime: polling drives
//! keepalive pings and acknowledgments, and repolling after an error makes
//! rumqttc re-establish the TCP connection, so reconnection is a sleep
//! (bounded exponential backoff) followed by the next poll.

use super::connection::{configure_mqtt_options, ConnectionState, MqttError, ReconnectConfig};
use super::status::{ConnectionTransition, StatusHandler};
use crate::config::MqttSection;
use crate::transport::Transport;
use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, QoS};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// MQTT command publisher with automatic reconnection
pub struct MqttPublisher {
    client: AsyncClient,
    // The event loop's network handle is Send but not Sync; the mutex
    // restores Sync for the publisher until start() takes the loop out.
    event_loop: Option<Mutex<EventLoop>>,
    broker_host: String,
    reconnect_config: ReconnectConfig,
    service_handle: Option<JoinHandle<()>>,
    state_rx: Option<watch::Receiver<ConnectionState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl MqttPublisher {
    /// Construct the client and event loop. No network side effects; the
    /// connection is opened by `start()`.
    pub fn new(config: &MqttSection, client_id_prefix: &str) -> Self {
        let mqtt_options = configure_mqtt_options(config, client_id_prefix);
        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);

        MqttPublisher {
            client,
            event_loop: Some(Mutex::new(event_loop)),
            broker_host: config.broker_host.clone(),
            reconnect_config: ReconnectConfig::from_config(config),
            service_handle: None,
            state_rx: None,
            shutdown_tx: None,
        }
    }

    /// Create connection state and shutdown channels
    #[allow(clippy::type_complexity)]
    fn setup_channels() -> (
        (
            watch::Sender<ConnectionState>,
            watch::Receiver<ConnectionState>,
        ),
        (watch::Sender<bool>, watch::Receiver<bool>),
    ) {
        (
            watch::channel(ConnectionState::Connecting),
            watch::channel(false),
        )
    }

    /// Spawn the background network-service task.
    ///
    /// Returns as soon as the task is running: an unreachable broker is not
    /// an error here, the task keeps retrying until shutdown.
    pub fn start(&mut self) -> Result<(), MqttError> {
        let event_loop = self
            .event_loop
            .take()
            .ok_or(MqttError::AlreadyStarted)?
            .into_inner();

        let ((state_tx, state_rx), (shutdown_tx, shutdown_rx)) = Self::setup_channels();
        self.state_rx = Some(state_rx);
        self.shutdown_tx = Some(shutdown_tx);

        let broker_host = self.broker_host.clone();
        let reconnect_config = self.reconnect_config.clone();

        info!("Starting network service task for broker: {}", broker_host);
        self.service_handle = Some(tokio::spawn(Self::run_service_loop(
            event_loop,
            broker_host,
            reconnect_config,
            state_tx,
            shutdown_rx,
        )));

        Ok(())
    }

    /// The network-service loop: poll events, report transitions, back off
    /// and retry on errors, stop on the shutdown signal or once a graceful
    /// disconnect has gone out.
    async fn run_service_loop(
        mut event_loop: EventLoop,
        broker_host: String,
        reconnect_config: ReconnectConfig,
        state_tx: watch::Sender<ConnectionState>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut retry_delay = reconnect_config.first_delay();

        loop {
            tokio::select! {
                // Shutdown signal takes priority over event processing
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!("Shutdown signal received, stopping network service task");
                        break;
                    }
                }

                polled = event_loop.poll() => match polled {
                    Ok(event) => {
                        if let Some(transition) = StatusHandler::route_event(&event) {
                            // Only accepted ConnAcks reach this arm
                            retry_delay = reconnect_config.first_delay();
                            Self::report_transition(transition, &broker_host, &state_tx);
                        }

                        // A processed outgoing DISCONNECT means the graceful
                        // close went out; nothing is left to service.
                        if matches!(event, Event::Outgoing(Outgoing::Disconnect)) {
                            debug!("Graceful disconnect sent, stopping network service task");
                            let _ = state_tx.send(ConnectionState::Disconnected(
                                "client disconnected".to_string(),
                            ));
                            break;
                        }
                    }
                    Err(e) => {
                        // A refused CONNACK surfaces as a poll error, not as
                        // an event; report it with its return code. Anything
                        // else is a network-level drop.
                        if let Some(transition) = StatusHandler::route_error(&e) {
                            Self::report_transition(transition, &broker_host, &state_tx);
                        } else {
                            let reason = e.to_string();
                            let was_connected =
                                matches!(*state_tx.borrow(), ConnectionState::Connected);

                            if was_connected {
                                println!("{}", StatusHandler::disconnected_notice(&reason));
                            } else {
                                warn!("Connection attempt failed: {}", reason);
                            }
                            let _ = state_tx.send(ConnectionState::Disconnected(reason));
                        }

                        if !Self::interruptible_sleep(shutdown_rx.clone(), retry_delay).await {
                            break;
                        }
                        retry_delay = reconnect_config.next_delay(retry_delay);
                        let _ = state_tx.send(ConnectionState::Connecting);
                    }
                }
            }
        }
        debug!("Network service task stopped");
    }

    /// Report a routed transition to the operator and the state channel.
    fn report_transition(
        transition: ConnectionTransition,
        broker_host: &str,
        state_tx: &watch::Sender<ConnectionState>,
    ) {
        match transition {
            ConnectionTransition::Accepted => {
                println!("{}", StatusHandler::connected_notice(broker_host));
                let _ = state_tx.send(ConnectionState::Connected);
            }
            ConnectionTransition::Refused(code) => {
                println!("{}", StatusHandler::refused_notice(code));
                let _ = state_tx.send(ConnectionState::Disconnected(format!(
                    "connection refused with return code {}",
                    StatusHandler::return_code_value(code)
                )));
            }
        }
    }

    /// Sleep that aborts early on the shutdown signal.
    /// Returns false if shutdown was requested during the sleep.
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay: Duration) -> bool {
        tokio::select! {
            _ = shutdown_rx.changed() => !*shutdown_rx.borrow(),
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Queue one payload for the topic at QoS 0. Returns once the message
    /// is handed to the send queue, connected or not; delivery while the
    /// network is down follows the client library's queueing policy.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), MqttError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;

        debug!("Queued command for topic: {}", topic);
        Ok(())
    }

    /// Stop the network-service task and close the connection.
    ///
    /// The DISCONNECT request goes out before any stop signal so a live
    /// service task can still write the graceful close; it then exits on
    /// its own. The shutdown signal is the fallback for a task stuck in
    /// backoff with no broker to disconnect from. Safe whatever the
    /// connection state, including never-started.
    pub async fn shutdown(&mut self) -> Result<(), MqttError> {
        // Best-effort: fails harmlessly when no connection was established
        if let Err(e) = self.client.disconnect().await {
            debug!("Disconnect request not delivered: {}", e);
        }

        if let Some(mut handle) = self.service_handle.take() {
            // Grace period for the task to send the DISCONNECT and stop
            match tokio::time::timeout(Duration::from_millis(500), &mut handle).await {
                Ok(Ok(())) => info!("Network service task shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!("Network service task ended with error: {}", e);
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    if let Some(shutdown_tx) = &self.shutdown_tx {
                        let _ = shutdown_tx.send(true);
                        debug!("Sent shutdown signal to network service task");
                    }
                    match tokio::time::timeout(Duration::from_secs(2), handle).await {
                        Ok(Ok(())) => info!("Network service task stopped on signal"),
                        Ok(Err(e)) if !e.is_cancelled() => {
                            warn!("Network service task ended with error: {}", e);
                        }
                        Err(_) => {
                            warn!("Network service task did not stop in time, aborting");
                        }
                        _ => {}
                    }
                }
            }
        }

        info!("MQTT publisher disconnected");
        Ok(())
    }

    /// Current connection state, or None before `start()`
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.state_rx.as_ref().map(|rx| rx.borrow().clone())
    }
}

#[async_trait::async_trait]
impl Transport for MqttPublisher {
    type Error = MqttError;

    async fn start(&mut self) -> Result<(), Self::Error> {
        MqttPublisher::start(self)
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        MqttPublisher::publish(self, topic, payload).await
    }

    async fn shutdown(&mut self) -> Result<(), Self::Error> {
        MqttPublisher::shutdown(self).await
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        MqttPublisher::connection_state(self)
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        // Stop the background task if shutdown() was never called. Async
        // teardown is impossible here, so the task is signalled and aborted.
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.service_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_publisher() -> MqttPublisher {
        let config = MqttSection {
            broker_host: "localhost".to_string(),
            ..MqttSection::default()
        };
        MqttPublisher::new(&config, "test-pub")
    }

    fn local_publisher(port: u16) -> MqttPublisher {
        let config = MqttSection {
            broker_host: "127.0.0.1".to_string(),
            broker_port: port,
            ..MqttSection::default()
        };
        MqttPublisher::new(&config, "test-pub")
    }

    /// Poll the connection state until the predicate holds or the deadline
    /// lapses.
    async fn wait_for_state<F>(publisher: &MqttPublisher, predicate: F) -> bool
    where
        F: Fn(&ConnectionState) -> bool,
    {
        for _ in 0..200 {
            if let Some(state) = publisher.connection_state() {
                if predicate(&state) {
                    return true;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[test]
    fn test_publisher_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MqttPublisher>();
    }

    #[test]
    fn test_setup_channels() {
        let ((state_tx, state_rx), (shutdown_tx, shutdown_rx)) = MqttPublisher::setup_channels();

        assert_eq!(*state_rx.borrow(), ConnectionState::Connecting);
        assert!(!(*shutdown_rx.borrow()));

        state_tx.send(ConnectionState::Connected).unwrap();
        assert_eq!(*state_rx.borrow(), ConnectionState::Connected);

        shutdown_tx.send(true).unwrap();
        assert!(*shutdown_rx.borrow());
    }

    #[tokio::test]
    async fn test_interruptible_sleep_completes() {
        let ((_, _), (_shutdown_tx, shutdown_rx)) = MqttPublisher::setup_channels();

        let completed =
            MqttPublisher::interruptible_sleep(shutdown_rx, Duration::from_millis(10)).await;
        assert!(completed, "sleep should complete without interruption");
    }

    #[tokio::test]
    async fn test_interruptible_sleep_interrupted() {
        let ((_, _), (shutdown_tx, shutdown_rx)) = MqttPublisher::setup_channels();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = shutdown_tx.send(true);
        });

        let completed =
            MqttPublisher::interruptible_sleep(shutdown_rx, Duration::from_secs(5)).await;
        assert!(!completed, "sleep should be cut short by the shutdown signal");
    }

    #[tokio::test]
    async fn test_connection_state_before_start() {
        let publisher = test_publisher();
        assert!(publisher.connection_state().is_none());
        assert!(!Transport::is_connected(&publisher));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut publisher = test_publisher();
        publisher.start().unwrap();
        assert!(matches!(
            publisher.start(),
            Err(MqttError::AlreadyStarted)
        ));
        publisher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_queues_while_disconnected() {
        // The event loop is never polled, so nothing reaches a broker; the
        // handoff to the send queue must still succeed.
        let publisher = test_publisher();
        let result = publisher.publish("epicure/commands", b"led:on".to_vec()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_without_start() {
        let mut publisher = test_publisher();
        assert!(publisher.shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_while_disconnected() {
        // Broker at an unroutable port: the service task only ever sees
        // connection errors. Teardown must still complete cleanly.
        let config = MqttSection {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 1,
            reconnect_min_secs: 1,
            ..MqttSection::default()
        };
        let mut publisher = MqttPublisher::new(&config, "test-pub");
        publisher.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(publisher.shutdown().await.is_ok());
        assert!(!Transport::is_connected(&publisher));
    }

    #[tokio::test]
    async fn test_broker_refusal_reports_return_code() {
        // Scripted broker that answers every CONNECT with CONNACK
        // return code 5 (not authorized).
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(&[0x20, 0x02, 0x00, 0x05]).await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });

        let mut publisher = local_publisher(port);
        publisher.start().unwrap();

        let refused = wait_for_state(&publisher, |state| {
            matches!(state, ConnectionState::Disconnected(reason)
                if reason.contains("return code 5"))
        })
        .await;
        assert!(refused, "refusal must surface with its return code");
        assert!(!Transport::is_connected(&publisher));

        publisher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_sends_graceful_disconnect() {
        // Scripted broker accepting the connection, then expecting the
        // DISCONNECT packet (0xE0) as the next inbound bytes.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (result_tx, result_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
            socket.flush().await.unwrap();

            let mut packet = [0u8; 4];
            let got_disconnect = matches!(
                tokio::time::timeout(Duration::from_secs(3), socket.read(&mut packet)).await,
                Ok(Ok(n)) if n >= 1 && packet[0] == 0xE0
            );
            let _ = result_tx.send(got_disconnect);
        });

        let mut publisher = local_publisher(port);
        publisher.start().unwrap();

        let connected =
            wait_for_state(&publisher, |state| *state == ConnectionState::Connected).await;
        assert!(connected, "scripted broker should accept the connection");

        publisher.shutdown().await.unwrap();

        assert!(
            result_rx.await.unwrap(),
            "graceful DISCONNECT must reach the broker before teardown"
        );
    }

    #[test]
    fn test_report_transition_updates_state() {
        let ((state_tx, state_rx), _) = MqttPublisher::setup_channels();

        MqttPublisher::report_transition(
            ConnectionTransition::Accepted,
            "localhost",
            &state_tx,
        );
        assert_eq!(*state_rx.borrow(), ConnectionState::Connected);

        MqttPublisher::report_transition(
            ConnectionTransition::Refused(rumqttc::ConnectReturnCode::ServiceUnavailable),
            "localhost",
            &state_tx,
        );
        let state = state_rx.borrow().clone();
        match state {
            ConnectionState::Disconnected(reason) => assert!(reason.contains('3')),
            state => panic!("expected Disconnected, got {state:?}"),
        }
    }
}
