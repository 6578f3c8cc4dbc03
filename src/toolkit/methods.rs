//! RPC method surface wired to the simulation toolkit.
//!
//! Registers the methods the front end calls (`runSimulation`,
//! `getLibraries`, `getBlockRenderInformation`, `getBlockHTML`), decoding
//! each request's named parameters into a typed struct and adapting the
//! toolkit's progress reports into `progress` / `displayValueUpdate`
//! notifications on the shared output channel.

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{SimulationObserver, SimulationRequest, SimulationToolkit};
use crate::rpc::{BoxFuture, Params, RequestContext, RpcServer};
use crate::{AppError, Result};

/// Decode a request's `params` object into a typed parameter struct.
fn decode_params<T: DeserializeOwned>(params: Params) -> Result<T> {
    serde_json::from_value(Value::Object(params))
        .map_err(|err| AppError::Protocol(format!("invalid parameters: {err}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunSimulationParams {
    model_path: PathBuf,
    #[serde(default = "default_duration")]
    duration: f64,
    #[serde(default = "default_steps")]
    steps: u32,
}

fn default_duration() -> f64 {
    5.0
}

fn default_steps() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockParams {
    block: Value,
    model_path: PathBuf,
}

/// Forwards toolkit reports as notifications on the request's context.
struct ContextObserver {
    ctx: RequestContext,
}

impl SimulationObserver for ContextObserver {
    fn progress(&self, percent: u32) {
        self.ctx.notify("progress", json!({ "progress": percent }));
    }

    fn display_value(&self, display_id: &str, value: f64, simulation_time: f64) {
        self.ctx.notify(
            "displayValueUpdate",
            json!({
                "displayId": display_id,
                "value": value,
                "simulationTime": simulation_time,
            }),
        );
    }
}

/// Register the toolkit-backed method surface on `server`.
pub fn register_methods(server: &mut RpcServer, toolkit: Arc<dyn SimulationToolkit>) {
    let tk = Arc::clone(&toolkit);
    server.register(
        "runSimulation",
        Arc::new(
            move |params: Params, ctx: RequestContext| -> BoxFuture<'static, Result<Value>> {
                let toolkit = Arc::clone(&tk);
                Box::pin(async move {
                    let input: RunSimulationParams = decode_params(params)?;
                    let observer: Arc<dyn SimulationObserver> =
                        Arc::new(ContextObserver { ctx: ctx.clone() });
                    let request = SimulationRequest {
                        model_path: input.model_path,
                        duration: input.duration,
                        steps: input.steps,
                    };
                    toolkit
                        .run_simulation(request, observer, ctx.cancellation().clone())
                        .await
                })
            },
        ),
    );

    let tk = Arc::clone(&toolkit);
    server.register(
        "getLibraries",
        Arc::new(
            move |_params: Params, _ctx: RequestContext| -> BoxFuture<'static, Result<Value>> {
                let toolkit = Arc::clone(&tk);
                Box::pin(async move { toolkit.libraries().await })
            },
        ),
    );

    let tk = Arc::clone(&toolkit);
    server.register(
        "getBlockRenderInformation",
        Arc::new(
            move |params: Params, _ctx: RequestContext| -> BoxFuture<'static, Result<Value>> {
                let toolkit = Arc::clone(&tk);
                Box::pin(async move {
                    let input: BlockParams = decode_params(params)?;
                    toolkit
                        .block_render_information(input.block, input.model_path)
                        .await
                })
            },
        ),
    );

    let tk = Arc::clone(&toolkit);
    server.register(
        "getBlockHTML",
        Arc::new(
            move |params: Params, _ctx: RequestContext| -> BoxFuture<'static, Result<Value>> {
                let toolkit = Arc::clone(&tk);
                Box::pin(async move {
                    let input: BlockParams = decode_params(params)?;
                    toolkit.block_html(input.block, input.model_path).await
                })
            },
        ),
    );
}
