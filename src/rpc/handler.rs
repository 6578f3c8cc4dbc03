//! Handler registry, request context, and the pre-request hook seam.
//!
//! A handler is an asynchronous operation taking the request's named
//! parameters and producing a JSON-serializable result or a descriptive
//! error. Handlers are registered by method name before the ingress loop
//! starts; registering a name twice overwrites the previous binding.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::outbound::OutboundSender;
use super::protocol::{Params, RequestId};
use crate::Result;

/// Boxed future returned by handler and hook trait objects.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-request context handed to a running handler.
///
/// Carries the request id, a handle for emitting advisory `notification`
/// and `print` messages on the shared output channel, and the request's
/// cancellation token for handlers that want to observe cancellation
/// explicitly between suspension points.
#[derive(Debug, Clone)]
pub struct RequestContext {
    id: RequestId,
    outbound: OutboundSender,
    cancel: CancellationToken,
}

impl RequestContext {
    pub(crate) fn new(id: RequestId, outbound: OutboundSender, cancel: CancellationToken) -> Self {
        Self {
            id,
            outbound,
            cancel,
        }
    }

    /// The id of the request this handler is serving.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Emit a one-way `notification` event while the handler runs.
    ///
    /// Advisory and unordered with respect to other tasks' output, but
    /// always delivered before this request's own terminal reply.
    pub fn notify(&self, event: impl Into<String>, data: Value) {
        self.outbound.notification(event, data);
    }

    /// Emit a one-way diagnostic `print` message.
    pub fn print(&self, message: impl Into<String>) {
        self.outbound.print(message);
    }

    /// The cancellation token signalled when this request is cancelled.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether cancellation has been requested for this request.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// An asynchronous RPC operation invocable by method name.
pub trait RequestHandler: Send + Sync {
    /// Run the operation with the request's named parameters.
    ///
    /// # Errors
    ///
    /// Any error is caught at the task boundary and reported to the caller
    /// as an `error` reply for this request id.
    fn call(&self, params: Params, ctx: RequestContext) -> BoxFuture<'_, Result<Value>>;
}

impl<F> RequestHandler for F
where
    F: Fn(Params, RequestContext) -> BoxFuture<'static, Result<Value>> + Send + Sync,
{
    fn call(&self, params: Params, ctx: RequestContext) -> BoxFuture<'_, Result<Value>> {
        self(params, ctx)
    }
}

/// Optional side effect run before every request's handler.
///
/// Absence means "always allowed"; presence means the hook must succeed
/// before the handler is spawned. A failure rejects the request with an
/// `error` reply and no task is created.
pub trait PreRequestHook: Send + Sync {
    /// Run the hook to completion before the request's handler starts.
    ///
    /// # Errors
    ///
    /// An error rejects the request; its description becomes the `error`
    /// reply text.
    fn before_request(&self) -> BoxFuture<'_, Result<()>>;
}

/// Mapping from method name to its registered operation.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn RequestHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `method` to `handler`, replacing any previous binding.
    pub fn register(&mut self, method: impl Into<String>, handler: Arc<dyn RequestHandler>) {
        self.handlers.insert(method.into(), handler);
    }

    /// Look up the handler registered for `method`.
    #[must_use]
    pub fn get(&self, method: &str) -> Option<Arc<dyn RequestHandler>> {
        self.handlers.get(method).map(Arc::clone)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("methods", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
