//! Built-in fixed-step simulation engine.
//!
//! A self-contained [`SimulationToolkit`] used when no external engine is
//! plugged in: it carries a static block-library catalog, derives render
//! metadata from the block description, and drives a fixed-step run that
//! sleeps between steps — giving every run the suspension points that
//! cooperative cancellation relies on.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{SimulationObserver, SimulationRequest, SimulationToolkit};
use crate::config::SimulationConfig;
use crate::rpc::BoxFuture;
use crate::{AppError, Result};

/// Fixed-step engine backed by a static block catalog.
#[derive(Debug, Clone)]
pub struct FixedStepToolkit {
    config: SimulationConfig,
}

impl FixedStepToolkit {
    /// Create an engine with the given simulation settings.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Port counts for a block type, `(inputs, outputs)`.
    fn port_counts(block_type: &str) -> (u32, u32) {
        match block_type {
            "Constant" | "SineWave" | "Step" => (0, 1),
            "Display" | "Scope" => (1, 0),
            "Sum" => (2, 1),
            _ => (1, 1),
        }
    }
}

impl SimulationToolkit for FixedStepToolkit {
    fn initialize(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            for path in &self.config.library_search_paths {
                if !path.is_dir() {
                    return Err(AppError::Toolkit(format!(
                        "library search path not found: {}",
                        path.display()
                    )));
                }
            }
            Ok(())
        })
    }

    fn libraries(&self) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            Ok(json!({
                "libraries": [
                    {
                        "name": "Sources",
                        "blocks": [
                            { "type": "Constant", "label": "Constant" },
                            { "type": "SineWave", "label": "Sine Wave" },
                            { "type": "Step", "label": "Step" },
                        ],
                    },
                    {
                        "name": "Sinks",
                        "blocks": [
                            { "type": "Display", "label": "Display" },
                            { "type": "Scope", "label": "Scope" },
                        ],
                    },
                    {
                        "name": "Math",
                        "blocks": [
                            { "type": "Gain", "label": "Gain" },
                            { "type": "Sum", "label": "Sum" },
                            { "type": "Integrator", "label": "Integrator" },
                        ],
                    },
                ],
            }))
        })
    }

    fn block_render_information(
        &self,
        block: Value,
        model_path: PathBuf,
    ) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let block_type = block
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| AppError::Toolkit("block description lacks a `type`".into()))?;
            let (inputs, outputs) = Self::port_counts(block_type);

            debug!(block_type, model = %model_path.display(), "render information requested");
            Ok(json!({
                "input_ports": inputs,
                "output_ports": outputs,
                "shape": "rectangle",
                "icon": block_type.to_lowercase(),
            }))
        })
    }

    fn block_html(&self, block: Value, model_path: PathBuf) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            let label = block
                .get("label")
                .or_else(|| block.get("type"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    AppError::Toolkit("block description lacks a `label` or `type`".into())
                })?;

            Ok(json!({
                "html": format!(
                    "<div class=\"block-view\"><h3>{label}</h3><p>{}</p></div>",
                    model_path.display()
                ),
            }))
        })
    }

    fn run_simulation(
        &self,
        request: SimulationRequest,
        observer: Arc<dyn SimulationObserver>,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            if !request.duration.is_finite() || request.duration <= 0.0 {
                return Err(AppError::Toolkit(
                    "simulation duration must be a positive number of seconds".into(),
                ));
            }
            if request.steps == 0 {
                return Err(AppError::Toolkit(
                    "simulation must run for at least one step".into(),
                ));
            }

            let step_duration = Duration::from_secs_f64(request.duration / f64::from(request.steps));
            debug!(
                model = %request.model_path.display(),
                duration = request.duration,
                steps = request.steps,
                "simulation started"
            );

            for step in 1..=request.steps {
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => {
                        debug!(step, "simulation stopped by cancellation");
                        return Err(AppError::Toolkit(
                            "simulation stopped before completion".into(),
                        ));
                    }

                    () = time::sleep(step_duration) => {}
                }

                let simulation_time =
                    request.duration * f64::from(step) / f64::from(request.steps);
                let percent = u32::try_from(u64::from(step) * 100 / u64::from(request.steps))
                    .unwrap_or(100);
                observer.progress(percent);
                observer.display_value("display-1", simulation_time.sin(), simulation_time);
            }

            Ok(json!({ "status": "completed" }))
        })
    }
}
