//! Bidirectional line-delimited JSON RPC over a byte-stream pair.
//!
//! The server multiplexes many concurrently outstanding requests, supports
//! cooperative mid-flight cancellation, emits out-of-band heartbeat and
//! notification traffic without blocking request processing, and guarantees
//! exactly one terminal reply per accepted request even when a handler
//! fails.
//!
//! Submodules:
//! - `protocol`: tagged wire message model and inbound line parsing.
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based framing
//!   with a maximum line length.
//! - `outbound`: single shared writer task behind a cloneable sender.
//! - `registry`: in-flight task table with atomic terminal-outcome claims.
//! - `handler`: handler/hook traits and the per-request context.
//! - `dispatch`: message routing and the per-request supervisor.
//! - `heartbeat`: periodic liveness ping emitter.
//! - `server`: assembly and the ingress loop.

pub mod codec;
pub mod dispatch;
pub mod handler;
pub mod heartbeat;
pub mod outbound;
pub mod protocol;
pub mod registry;
pub mod server;

pub use handler::{BoxFuture, HandlerRegistry, PreRequestHook, RequestContext, RequestHandler};
pub use outbound::OutboundSender;
pub use protocol::{HeartbeatKind, InboundMessage, OutboundMessage, Params, RequestId};
pub use registry::TaskRegistry;
pub use server::RpcServer;
