//! Server assembly and the ingress loop.
//!
//! [`RpcServer`] owns the handler registry and the optional pre-request
//! hook; [`RpcServer::serve`] wires the writer task, the heartbeat emitter,
//! and the task registry together and then drives the ingress loop until
//! end of input. The server is constructed once and consumed by `serve`;
//! there is no ambient global state.
//!
//! `serve` is generic over the input/output streams so tests can drive the
//! whole server over in-memory duplex pipes; the binary passes
//! `tokio::io::stdin()` / `tokio::io::stdout()`, which keep blocking
//! console reads off the cooperative scheduler.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::codec::RpcCodec;
use super::dispatch::Dispatcher;
use super::handler::{HandlerRegistry, PreRequestHook, RequestHandler};
use super::heartbeat::run_heartbeat;
use super::outbound;
use super::protocol::parse_inbound_line;
use super::registry::TaskRegistry;
use crate::{AppError, Result, ServerConfig};

/// Line-delimited JSON RPC server over a byte-stream pair.
pub struct RpcServer {
    handlers: HandlerRegistry,
    hook: Option<Arc<dyn PreRequestHook>>,
    heartbeat_interval: Duration,
    max_line_bytes: usize,
}

impl RpcServer {
    /// Create a server with no registered methods.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            handlers: HandlerRegistry::new(),
            hook: None,
            heartbeat_interval: config.heartbeat_interval(),
            max_line_bytes: config.max_line_bytes,
        }
    }

    /// Install the pre-request hook run before every handler.
    #[must_use]
    pub fn with_pre_request_hook(mut self, hook: Arc<dyn PreRequestHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Override the heartbeat interval (e.g. from a CLI flag or for tests).
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Bind `method` to `handler`, replacing any previous binding.
    pub fn register(&mut self, method: impl Into<String>, handler: Arc<dyn RequestHandler>) {
        self.handlers.register(method, handler);
    }

    /// Run the server until end of input, then shut down in order.
    ///
    /// Reads one line at a time from `input`, decodes it, and dispatches.
    /// Blank lines are skipped; only true end-of-stream (or an
    /// unrecoverable read error) terminates the loop. A line that is not a
    /// valid protocol message is reported over the `print` channel and
    /// skipped; it never takes the server down.
    ///
    /// On shutdown: the root token is cancelled so in-flight tasks unwind
    /// cooperatively and report `cancelled`, the heartbeat stops, and the
    /// writer drains every queued line before this method returns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the output stream fails while draining, or
    /// `AppError::Rpc` if the writer task itself dies.
    pub async fn serve<R, W>(self, input: R, output: W) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = outbound::channel();
        let root = CancellationToken::new();
        let registry = Arc::new(TaskRegistry::new());

        let writer = tokio::spawn(outbound::run_writer(output, outbound_rx));
        let heartbeat = tokio::spawn(run_heartbeat(
            self.heartbeat_interval,
            outbound_tx.clone(),
            root.child_token(),
        ));

        let dispatcher = Dispatcher::new(
            Arc::new(self.handlers),
            self.hook,
            Arc::clone(&registry),
            outbound_tx.clone(),
            root.clone(),
        );

        let mut framed = FramedRead::new(input, RpcCodec::new(self.max_line_bytes));
        info!(
            heartbeat_interval_secs = self.heartbeat_interval.as_secs(),
            "ingress loop started"
        );

        while let Some(item) = framed.next().await {
            match item {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        // A blank keep-alive line is not end-of-stream.
                        continue;
                    }

                    match parse_inbound_line(trimmed) {
                        Ok(Some(message)) => dispatcher.dispatch(message).await,
                        Ok(None) => {
                            // Unknown message type, logged in the parser.
                        }
                        Err(err) => {
                            warn!(error = %err, raw_line = %trimmed, "undecodable input line, skipping");
                            outbound_tx.print(format!("failed to decode input line: {err}"));
                        }
                    }
                }
                Err(err) => {
                    // Framing or stream failure: resynchronization is not
                    // possible, so report it and shut down in order.
                    warn!(error = %err, "input stream failed, shutting down");
                    outbound_tx.print(format!("input stream failed: {err}"));
                    break;
                }
            }
        }

        info!("end of input, shutting down");

        // In-flight tasks unwind at their next suspension point and report
        // cancelled through the normal claim path.
        root.cancel();
        registry.shutdown().await;
        let _ = heartbeat.await;

        // Every sender is gone once the dispatcher drops; the writer drains
        // the queue and exits.
        drop(dispatcher);
        drop(outbound_tx);
        writer
            .await
            .map_err(|err| AppError::Rpc(format!("writer task failed: {err}")))??;

        info!("server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("handlers", &self.handlers)
            .field("has_hook", &self.hook.is_some())
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("max_line_bytes", &self.max_line_bytes)
            .finish()
    }
}
