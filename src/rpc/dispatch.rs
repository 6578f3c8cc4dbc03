//! Message dispatch and the per-request task supervisor.
//!
//! [`Dispatcher::dispatch`] is the single entry point for decoded inbound
//! messages. Requests run the pre-request hook, resolve their handler, and
//! spawn a supervised task; cancels signal the task registry; heartbeat
//! pings are answered immediately with a pong echoing the caller's
//! timestamp.
//!
//! The supervisor races the handler future against the request's
//! cancellation token, converts any failure (including a panic) into a
//! descriptive error at the task boundary, and then claims the id from the
//! registry — only the claim winner emits the terminal reply, so a request
//! finishing concurrently with a cancel resolves to exactly one outcome.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::handler::{HandlerRegistry, PreRequestHook, RequestContext, RequestHandler};
use super::outbound::OutboundSender;
use super::protocol::{HeartbeatKind, InboundMessage, Params, RequestId};
use super::registry::TaskRegistry;

/// Routes decoded messages to request, cancel, and heartbeat behavior.
pub(crate) struct Dispatcher {
    handlers: Arc<HandlerRegistry>,
    hook: Option<Arc<dyn PreRequestHook>>,
    registry: Arc<TaskRegistry>,
    outbound: OutboundSender,
    root: CancellationToken,
}

impl Dispatcher {
    pub(crate) fn new(
        handlers: Arc<HandlerRegistry>,
        hook: Option<Arc<dyn PreRequestHook>>,
        registry: Arc<TaskRegistry>,
        outbound: OutboundSender,
        root: CancellationToken,
    ) -> Self {
        Self {
            handlers,
            hook,
            registry,
            outbound,
            root,
        }
    }

    /// Route one decoded inbound message.
    pub(crate) async fn dispatch(&self, message: InboundMessage) {
        match message {
            InboundMessage::Request { id, method, params } => {
                self.handle_request(id, &method, params).await;
            }
            InboundMessage::Cancel { id } => {
                // No direct reply; the cancelled task's own
                // response{status:"cancelled"} is the acknowledgment.
                self.registry.cancel(id).await;
            }
            InboundMessage::Heartbeat {
                subtype: HeartbeatKind::Ping,
                timestamp,
            } => {
                // Echo the caller's timestamp, not a freshly sampled one.
                self.outbound.heartbeat(HeartbeatKind::Pong, timestamp);
            }
            InboundMessage::Heartbeat {
                subtype: HeartbeatKind::Pong,
                timestamp,
            } => {
                debug!(timestamp, "ignoring inbound heartbeat pong");
            }
        }
    }

    /// Admit a request: hook, method lookup, duplicate check, spawn.
    async fn handle_request(&self, id: RequestId, method: &str, params: Params) {
        if let Some(ref hook) = self.hook {
            if let Err(err) = hook.before_request().await {
                warn!(id, error = %err, "pre-request hook rejected request");
                self.outbound.error(id, err.to_string());
                return;
            }
        }

        let Some(handler) = self.handlers.get(method) else {
            warn!(id, method, "request for unknown method");
            self.outbound.error(id, format!("unknown method: {method}"));
            return;
        };

        let cancel = self.root.child_token();
        if !self.registry.register(id, cancel.clone()).await {
            warn!(id, "request id already in flight");
            self.outbound
                .error(id, format!("request id {id} is already in flight"));
            return;
        }

        debug!(id, method, "request accepted");
        let ctx = RequestContext::new(id, self.outbound.clone(), cancel);
        let registry = Arc::clone(&self.registry);
        let outbound = self.outbound.clone();
        let join = tokio::spawn(run_request(id, handler, params, ctx, registry, outbound));
        self.registry.attach(id, join).await;
    }
}

/// Terminal outcome of one supervised request task.
enum Outcome {
    Succeeded(Value),
    Cancelled,
    Failed(String),
}

/// Supervise one handler invocation from start to terminal reply.
async fn run_request(
    id: RequestId,
    handler: Arc<dyn RequestHandler>,
    params: Params,
    ctx: RequestContext,
    registry: Arc<TaskRegistry>,
    outbound: OutboundSender,
) {
    let cancel = ctx.cancellation().clone();

    // Catch panics at the task boundary: a failing handler must become an
    // error reply, never take the process down.
    let operation = AssertUnwindSafe(handler.call(params, ctx)).catch_unwind();

    let outcome = tokio::select! {
        biased;

        () = cancel.cancelled() => Outcome::Cancelled,

        result = operation => match result {
            Ok(Ok(value)) => Outcome::Succeeded(value),
            Ok(Err(err)) => Outcome::Failed(err.to_string()),
            Err(_) => Outcome::Failed("handler panicked".into()),
        },
    };

    // Single atomic claim of the terminal outcome: whoever removes the
    // entry emits the reply; everyone else stays silent.
    if registry.claim(id).await {
        match outcome {
            Outcome::Succeeded(value) => {
                debug!(id, "request succeeded");
                outbound.response(id, value);
            }
            Outcome::Cancelled => {
                debug!(id, "request cancelled");
                outbound.response(id, json!({ "status": "cancelled" }));
            }
            Outcome::Failed(message) => {
                warn!(id, error = %message, "request failed");
                outbound.error(id, message);
            }
        }
    } else {
        debug!(id, "terminal outcome already claimed");
    }
}
