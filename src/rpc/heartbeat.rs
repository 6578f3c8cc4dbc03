//! Periodic liveness ping emitter.
//!
//! Runs as its own task for the lifetime of the server, emitting
//! `heartbeat{ping, now}` on a fixed interval. Because it only touches the
//! unbounded outbound channel, request load can neither delay nor be
//! delayed by it. The first ping fires one full interval after start.

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::outbound::OutboundSender;
use super::protocol::HeartbeatKind;

/// Emit `ping` messages every `interval` until `cancel` fires.
pub async fn run_heartbeat(
    interval: Duration,
    outbound: OutboundSender,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    // A stalled tick must not produce a burst of catch-up pings.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("heartbeat emitter stopping");
                break;
            }

            _ = ticker.tick() => {
                outbound.heartbeat(HeartbeatKind::Ping, chrono::Utc::now().timestamp());
            }
        }
    }
}
