//! Interactive command session
//!
//! The foreground half of the publisher: prompt, read one line, publish it
//! verbatim to the fixed topic, repeat. Generic over [`Transport`] so tests
//! can drive it against a mock and scripted input.

use crate::error::{PublisherError, PublisherResult};
use crate::transport::Transport;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

/// One interactive session bound to a transport and a fixed topic
pub struct CommandSession<T: Transport> {
    transport: T,
    topic: String,
}

impl<T: Transport> CommandSession<T> {
    pub fn new(transport: T, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Handle one operator line. Lines that trim to empty are silently
    /// skipped; anything else is published byte-for-byte (no validation,
    /// payload semantics are the consumer's concern) and confirmed on
    /// stdout. Returns whether a publish was issued.
    pub async fn dispatch(&self, line: &str) -> PublisherResult<bool> {
        if line.trim().is_empty() {
            debug!("Ignoring empty input line");
            return Ok(false);
        }

        self.transport
            .publish(&self.topic, line.as_bytes().to_vec())
            .await
            .map_err(PublisherError::transport)?;

        println!("Published: '{}' to '{}'", line, self.topic);
        Ok(true)
    }

    /// The blocking read-and-publish loop: prompt, read a line, dispatch.
    /// Runs until the input source reaches end-of-file; interruption is the
    /// caller's concern (it races this future against the signal handler).
    pub async fn run<R>(&self, input: R) -> PublisherResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            prompt()?;
            match lines.next_line().await? {
                Some(line) => {
                    self.dispatch(&line).await?;
                }
                None => {
                    debug!("Input closed, ending session");
                    return Ok(());
                }
            }
        }
    }

    /// Tear down the underlying transport. Safe regardless of connection
    /// state; must be called exactly once on every exit path.
    pub async fn shutdown(&mut self) -> PublisherResult<()> {
        self.transport
            .shutdown()
            .await
            .map_err(PublisherError::transport)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Print the operator prompt without a trailing newline.
fn prompt() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()
}
