//! Integration tests for the interactive command session
//!
//! Drives `CommandSession` against the mock transport with scripted
//! operator input, covering the publish path, blank-line handling, and the
//! teardown contract.

use epicure_publisher::session::CommandSession;
use epicure_publisher::testing::mocks::MockTransport;
use epicure_publisher::transport::mqtt::ConnectionState;
use epicure_publisher::transport::Transport;
use epicure_publisher::PublisherError;

#[tokio::test]
async fn test_operator_scenario_publishes_each_command_once() {
    // Operator types two commands, hits Enter on a blank line, then quits.
    let session = CommandSession::new(MockTransport::new(), "epicure/commands");

    let input: &[u8] = b"led:on\nmotor:100:1\n\n";
    session.run(input).await.unwrap();

    let published = session.transport().published().await;
    assert_eq!(published.len(), 2, "blank line must not be published");
    assert_eq!(published[0], ("epicure/commands".to_string(), b"led:on".to_vec()));
    assert_eq!(
        published[1],
        ("epicure/commands".to_string(), b"motor:100:1".to_vec())
    );
}

#[tokio::test]
async fn test_cleanup_runs_once_after_session() {
    let mut transport = MockTransport::new();
    transport.start().await.unwrap();

    let mut session = CommandSession::new(transport, "epicure/commands");
    session.run(&b"led:on\n"[..]).await.unwrap();
    session.shutdown().await.unwrap();

    assert_eq!(session.transport().shutdown_calls().await, 1);
    assert_eq!(
        session.transport().connection_state(),
        Some(ConnectionState::Disconnected("mock shutdown".to_string()))
    );
}

#[tokio::test]
async fn test_cleanup_succeeds_when_connection_is_down() {
    let transport = MockTransport::new();
    transport
        .set_state(ConnectionState::Disconnected("network fault".to_string()))
        .await;

    let mut session = CommandSession::new(transport, "epicure/commands");
    assert!(session.shutdown().await.is_ok());
    assert_eq!(session.transport().shutdown_calls().await, 1);
}

#[tokio::test]
async fn test_cleanup_succeeds_when_never_started() {
    let mut session = CommandSession::new(MockTransport::new(), "epicure/commands");
    assert!(session.shutdown().await.is_ok());
}

#[tokio::test]
async fn test_repeated_commands_publish_independently() {
    let session = CommandSession::new(MockTransport::new(), "epicure/commands");

    assert!(session.dispatch("motor:100:1").await.unwrap());
    assert!(session.dispatch("motor:100:1").await.unwrap());

    let published = session.transport().published().await;
    assert_eq!(published.len(), 2);
    assert_eq!(published[0], published[1]);
}

#[tokio::test]
async fn test_payload_is_verbatim_without_validation() {
    // Malformed "commands" are the consumer's problem, not the publisher's.
    let session = CommandSession::new(MockTransport::new(), "epicure/commands");

    let weird = "not-a-command ::: 100% {json?}";
    assert!(session.dispatch(weird).await.unwrap());

    let published = session.transport().published().await;
    assert_eq!(published[0].1, weird.as_bytes().to_vec());
}

#[tokio::test]
async fn test_publish_failure_stops_the_loop() {
    let session = CommandSession::new(MockTransport::with_failure(), "epicure/commands");

    let result = session.run(&b"led:on\n"[..]).await;
    assert!(matches!(result, Err(PublisherError::Transport(_))));
    assert!(session.transport().published().await.is_empty());
}
