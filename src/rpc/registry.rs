//! In-flight request tracking and cooperative cancellation.
//!
//! The registry owns the `id → task` mapping for every accepted request.
//! Each entry holds the task's cancellation token and join handle; the
//! entry's removal ([`TaskRegistry::claim`]) is the single atomic step that
//! decides the request's terminal outcome. A task races its handler future
//! against its token, and whichever side finishes first claims the id;
//! the loser of the race finds the entry gone and emits nothing, so every
//! request produces at most one terminal message.
//!
//! Per-request lifecycle: registered (pending, operation running) →
//! claimed (terminal: succeeded, cancelled, or failed; entry removed).
//! There is no transition out of the claimed state.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::protocol::RequestId;

#[derive(Debug)]
struct TaskEntry {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

/// Registry of in-flight request tasks keyed by request id.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<RequestId, TaskEntry>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request id with its cancellation token.
    ///
    /// Called before the task is spawned so a racing `cancel` or an
    /// immediately-finishing task always finds its entry. Returns `false`
    /// when the id is already in flight, in which case the caller must not
    /// spawn a task for it.
    pub async fn register(&self, id: RequestId, cancel: CancellationToken) -> bool {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&id) {
            return false;
        }
        tasks.insert(id, TaskEntry { cancel, join: None });
        true
    }

    /// Attach the spawned task's join handle to its entry.
    ///
    /// No-op when the task already claimed its outcome (it can finish
    /// between `register` and `attach`).
    pub async fn attach(&self, id: RequestId, join: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().await;
        if let Some(entry) = tasks.get_mut(&id) {
            entry.join = Some(join);
        }
    }

    /// Signal cooperative cancellation to the task registered under `id`.
    ///
    /// A no-op when the id is unknown or already terminal. The task stops
    /// at its next suspension point; the eventual
    /// `response{status:"cancelled"}` reply is the acknowledgment.
    pub async fn cancel(&self, id: RequestId) {
        let tasks = self.tasks.lock().await;
        if let Some(entry) = tasks.get(&id) {
            debug!(id, "cancellation requested");
            entry.cancel.cancel();
        } else {
            debug!(id, "cancel for unknown or terminal id ignored");
        }
    }

    /// Claim the terminal outcome for `id`, removing its entry.
    ///
    /// Returns `true` exactly once per registered id; the caller may emit
    /// the request's terminal message only on a `true` return. A second
    /// claim (or a claim for an unknown id) returns `false`.
    pub async fn claim(&self, id: RequestId) -> bool {
        self.tasks.lock().await.remove(&id).is_some()
    }

    /// Number of requests currently in flight.
    pub async fn in_flight(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Cancel every in-flight task and wait for their supervisors to finish.
    ///
    /// Entries stay registered while the tokens fire so each task can still
    /// claim its id and report `cancelled` through the normal path.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut tasks = self.tasks.lock().await;
            tasks
                .values_mut()
                .filter_map(|entry| {
                    entry.cancel.cancel();
                    entry.join.take()
                })
                .collect()
        };

        for handle in handles {
            let _ = handle.await;
        }
    }
}
