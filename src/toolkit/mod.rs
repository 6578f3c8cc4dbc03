//! Simulation toolkit boundary.
//!
//! The toolkit is the external collaborator behind the RPC surface: an
//! opaque engine that knows how to enumerate block libraries, describe
//! blocks, and run simulations. The server treats it as a black box —
//! request handlers adapt wire parameters to [`SimulationToolkit`] calls
//! and forward its progress reports as `notification` messages.
//!
//! Submodules:
//! - `gate`: lazy one-time engine bring-up as the pre-request hook.
//! - `methods`: RPC method registrations wired to the toolkit.
//! - `local`: built-in fixed-step engine.

pub mod gate;
pub mod local;
pub mod methods;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::rpc::BoxFuture;
use crate::Result;

/// One simulation run as decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRequest {
    /// Path to the system description file.
    pub model_path: PathBuf,
    /// Total simulated duration in seconds.
    pub duration: f64,
    /// Number of fixed steps the run is divided into.
    pub steps: u32,
}

/// Sink for advisory reports emitted while a simulation runs.
///
/// Implementations forward these onto the shared output channel; delivery
/// is best-effort and carries no ordering guarantee across tasks.
pub trait SimulationObserver: Send + Sync {
    /// Report overall completion as an integer percentage (0–100).
    fn progress(&self, percent: u32);

    /// Report a sampled display-block value at a simulation time.
    fn display_value(&self, display_id: &str, value: f64, simulation_time: f64);
}

/// The opaque simulation/compilation engine invoked by request handlers.
pub trait SimulationToolkit: Send + Sync {
    /// One-time engine bring-up.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error when the engine is unavailable; the
    /// caller remembers the failure and rejects subsequent requests with
    /// the same description.
    fn initialize(&self) -> BoxFuture<'_, Result<()>>;

    /// Enumerate the available block libraries.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Toolkit` when the catalog cannot be produced.
    fn libraries(&self) -> BoxFuture<'_, Result<Value>>;

    /// Produce render metadata (ports, shape) for one block description.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Toolkit` when the block description is unusable.
    fn block_render_information(
        &self,
        block: Value,
        model_path: PathBuf,
    ) -> BoxFuture<'_, Result<Value>>;

    /// Produce rendered HTML for one block's plot or display.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Toolkit` when the block description is unusable.
    fn block_html(&self, block: Value, model_path: PathBuf) -> BoxFuture<'_, Result<Value>>;

    /// Run a simulation, reporting through `observer` as it advances.
    ///
    /// The engine must reach a suspension point between steps and stop
    /// promptly once `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Toolkit` on invalid run parameters or engine
    /// failure mid-run.
    fn run_simulation(
        &self,
        request: SimulationRequest,
        observer: Arc<dyn SimulationObserver>,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Value>>;
}
