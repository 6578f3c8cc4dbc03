//! Outbound message channel and writer task.
//!
//! The output stream is a single shared append-only channel: every component
//! that emits a message sends it through a cloneable [`OutboundSender`], and
//! one writer task drains the queue, serializes each message to a single
//! NDJSON line, writes it, and flushes. Funnelling all writers through one
//! task makes each line write atomic with respect to other emitters, and
//! channel order is wire order: messages one task emits arrive in the
//! order it sent them.
//!
//! The channel is unbounded so neither the heartbeat emitter nor the
//! dispatcher can ever block on output; back-pressure beyond the
//! line-buffered stream itself is out of scope for this transport.

use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::protocol::{HeartbeatKind, OutboundMessage, RequestId};
use crate::{AppError, Result};

/// Create a linked sender/receiver pair for the outbound channel.
#[must_use]
pub fn channel() -> (OutboundSender, mpsc::UnboundedReceiver<OutboundMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundSender { tx }, rx)
}

/// Cloneable handle for queueing outbound messages.
///
/// Sends never block. If the writer task has already exited (output stream
/// gone), the message is dropped with a warning; by then the front end is
/// no longer listening.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl OutboundSender {
    /// Queue an arbitrary outbound message.
    pub fn send(&self, message: OutboundMessage) {
        if self.tx.send(message).is_err() {
            warn!("outbound channel closed; dropping message");
        }
    }

    /// Queue a terminal success reply.
    pub fn response(&self, id: RequestId, result: Value) {
        self.send(OutboundMessage::Response { id, result });
    }

    /// Queue a terminal failure reply.
    pub fn error(&self, id: RequestId, error: impl Into<String>) {
        self.send(OutboundMessage::Error {
            id,
            error: error.into(),
        });
    }

    /// Queue a heartbeat message.
    pub fn heartbeat(&self, subtype: HeartbeatKind, timestamp: i64) {
        self.send(OutboundMessage::Heartbeat { subtype, timestamp });
    }

    /// Queue a one-way notification event.
    pub fn notification(&self, event: impl Into<String>, data: Value) {
        self.send(OutboundMessage::Notification {
            event: event.into(),
            data,
        });
    }

    /// Queue a one-way diagnostic text message.
    pub fn print(&self, message: impl Into<String>) {
        self.send(OutboundMessage::Print {
            message: message.into(),
        });
    }
}

/// Writer task — drains the outbound queue onto the output stream.
///
/// Serializes each message as one `\n`-terminated line, writes it, and
/// flushes immediately so the front end sees every message as soon as it is
/// produced. Exits cleanly when every [`OutboundSender`] clone has been
/// dropped and the queue is drained, which lets the server flush any
/// still-queued terminal replies during shutdown.
///
/// # Errors
///
/// - `AppError::Protocol` if a message fails to serialize (not expected).
/// - `AppError::Io` if writing to the output stream fails (e.g. the front
///   end closed its end of the pipe).
pub async fn run_writer<W>(
    mut output: W,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(message) = rx.recv().await {
        let mut bytes = message.to_line()?.into_bytes();
        bytes.push(b'\n');

        output.write_all(&bytes).await.map_err(|err| {
            warn!(error = %err, "write to output stream failed");
            AppError::Io(format!("write failed: {err}"))
        })?;
        output
            .flush()
            .await
            .map_err(|err| AppError::Io(format!("flush failed: {err}")))?;
    }

    debug!("outbound channel closed, writer stopping");
    Ok(())
}
