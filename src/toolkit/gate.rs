//! Lazy one-time toolkit bring-up as the pre-request hook.
//!
//! The engine is not initialized at process start — the first request pays
//! for bring-up, and the outcome is remembered. A failed bring-up is
//! terminal: every later request is rejected with the same descriptive
//! error instead of retrying a known-broken engine.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::SimulationToolkit;
use crate::rpc::{BoxFuture, PreRequestHook};
use crate::{AppError, Result};

/// Engine lifecycle owned by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EngineState {
    /// No request has arrived yet; bring-up is pending.
    Uninitialized,
    /// Bring-up succeeded; requests pass straight through.
    Ready,
    /// Bring-up failed; the description is repeated for every request.
    Failed(String),
}

/// Pre-request hook gating every request on engine readiness.
pub struct ToolkitGate {
    toolkit: Arc<dyn SimulationToolkit>,
    state: Mutex<EngineState>,
}

impl ToolkitGate {
    /// Create a gate for `toolkit` in the uninitialized state.
    #[must_use]
    pub fn new(toolkit: Arc<dyn SimulationToolkit>) -> Self {
        Self {
            toolkit,
            state: Mutex::new(EngineState::Uninitialized),
        }
    }
}

impl PreRequestHook for ToolkitGate {
    fn before_request(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            // The lock is held across bring-up so a second request arriving
            // mid-initialization waits for the outcome instead of racing a
            // duplicate bring-up.
            let mut state = self.state.lock().await;
            match &*state {
                EngineState::Ready => Ok(()),
                EngineState::Failed(description) => {
                    Err(AppError::Toolkit(description.clone()))
                }
                EngineState::Uninitialized => match self.toolkit.initialize().await {
                    Ok(()) => {
                        info!("simulation toolkit initialized");
                        *state = EngineState::Ready;
                        Ok(())
                    }
                    Err(err) => {
                        let description = format!("simulation toolkit unavailable: {err}");
                        warn!(error = %description, "toolkit bring-up failed");
                        *state = EngineState::Failed(description.clone());
                        Err(AppError::Toolkit(description))
                    }
                },
            }
        })
    }
}

impl std::fmt::Debug for ToolkitGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolkitGate").finish_non_exhaustive()
    }
}
