//! Epicure command publisher - main entry point
//!
//! Reads operator commands line-by-line and publishes each one to the
//! configured MQTT topic. Ctrl-C (or SIGTERM, or closing stdin) triggers
//! the graceful teardown path.

use epicure_publisher::config::PublisherConfig;
use epicure_publisher::logging::init_default_logging;
use epicure_publisher::session::CommandSession;
use epicure_publisher::transport::mqtt::MqttPublisher;
use epicure_publisher::transport::Transport;
use std::process;
use tokio::io::BufReader;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    init_default_logging();

    let config = match PublisherConfig::load_default() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    info!(
        "Starting epicure-publisher v{} for topic: {}",
        env!("CARGO_PKG_VERSION"),
        config.publisher.topic
    );

    let code = run_publisher(config).await;
    process::exit(code);
}

/// Run the interactive session to completion and return the exit code.
/// Cleanup runs unconditionally on every path out of the loop.
async fn run_publisher(config: PublisherConfig) -> i32 {
    let mut transport = MqttPublisher::new(&config.mqtt, &config.publisher.client_id_prefix);

    println!(
        "Attempting to connect to {}:{}...",
        config.mqtt.broker_host, config.mqtt.broker_port
    );
    if let Err(e) = Transport::start(&mut transport).await {
        error!("Failed to start network service task: {}", e);
        return 1;
    }

    print_banner();

    let mut session = CommandSession::new(transport, config.publisher.topic);

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(int), Ok(term)) => (int, term),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to install signal handlers: {}", e);
            return 1;
        }
    };

    // The input loop races the shutdown signals; EOF on stdin counts as a
    // normal exit too.
    let result = tokio::select! {
        res = session.run(BufReader::new(tokio::io::stdin())) => res,
        _ = sigint.recv() => {
            println!("\nDisconnecting and shutting down...");
            Ok(())
        }
        _ = sigterm.recv() => {
            println!("\nDisconnecting and shutting down...");
            Ok(())
        }
    };

    let code = match &result {
        Ok(()) => 0,
        Err(e) => {
            println!("An error occurred: {e}");
            1
        }
    };

    if let Err(e) = session.shutdown().await {
        warn!("Error during shutdown: {}", e);
    }
    println!("Shutdown complete.");
    code
}

fn print_banner() {
    println!();
    println!("--- Epicure Robotics Command Publisher ---");
    println!("Type your command and press Enter.");
    println!("Examples: 'led:on', 'led:off', 'motor:100:1'");
    println!("Press CTRL+C to quit.");
    println!();
}
