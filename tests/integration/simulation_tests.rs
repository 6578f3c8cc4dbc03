//! End-to-end tests of the toolkit-backed method surface, assembled the
//! same way the binary assembles it: built-in engine behind its bring-up
//! gate, methods registered on a fresh server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use syslink_server::config::SimulationConfig;
use syslink_server::rpc::RpcServer;
use syslink_server::toolkit::gate::ToolkitGate;
use syslink_server::toolkit::local::FixedStepToolkit;
use syslink_server::toolkit::methods::register_methods;
use syslink_server::ServerConfig;

use super::test_helpers::{start_server, TestClient, QUIET_HEARTBEAT};

/// Assemble the production server shape over the given simulation config.
fn sim_server(simulation: SimulationConfig) -> RpcServer {
    let config = ServerConfig {
        simulation,
        ..ServerConfig::default()
    };
    let toolkit = Arc::new(FixedStepToolkit::new(config.simulation.clone()));
    let gate = Arc::new(ToolkitGate::new(toolkit.clone()));

    let mut server = RpcServer::new(&config)
        .with_pre_request_hook(gate)
        .with_heartbeat_interval(QUIET_HEARTBEAT);
    register_methods(&mut server, toolkit);
    server
}

fn default_sim_server() -> RpcServer {
    sim_server(SimulationConfig::default())
}

/// Collect messages for `id` until its terminal reply, returning
/// `(notifications, terminal)`.
async fn drain_run(client: &mut TestClient) -> (Vec<Value>, Value) {
    let mut notifications = Vec::new();
    loop {
        let message = client.next_message().await;
        match message["type"].as_str() {
            Some("notification") => notifications.push(message),
            Some("response" | "error") => return (notifications, message),
            other => panic!("unexpected message type during a run: {other:?}"),
        }
    }
}

/// A short run reports integer progress up to 100 and display samples,
/// then exactly one completed response — notifications strictly first.
#[tokio::test]
async fn run_simulation_reports_progress_then_completes() {
    let (mut client, _handle) = start_server(default_sim_server());

    client
        .send(&json!({
            "type": "request",
            "id": 1,
            "method": "runSimulation",
            "params": {"modelPath": "model.pslk", "duration": 0.2, "steps": 4},
        }))
        .await;

    let (notifications, terminal) = drain_run(&mut client).await;

    let progress: Vec<u64> = notifications
        .iter()
        .filter(|n| n["event"] == "progress")
        .filter_map(|n| n["data"]["progress"].as_u64())
        .collect();
    assert_eq!(progress, vec![25, 50, 75, 100]);

    let samples: Vec<&Value> = notifications
        .iter()
        .filter(|n| n["event"] == "displayValueUpdate")
        .collect();
    assert_eq!(samples.len(), 4);
    for sample in samples {
        assert_eq!(sample["data"]["displayId"], "display-1");
        assert!(sample["data"]["simulationTime"].is_number());
        assert!(sample["data"]["value"].is_number());
    }

    assert_eq!(
        terminal,
        json!({"type": "response", "id": 1, "result": {"status": "completed"}})
    );
}

/// Cancelling a run mid-flight resolves it as cancelled and no completed
/// response ever follows.
#[tokio::test]
async fn run_simulation_cancels_mid_flight() {
    let (mut client, _handle) = start_server(default_sim_server());

    client
        .send(&json!({
            "type": "request",
            "id": 2,
            "method": "runSimulation",
            "params": {"modelPath": "model.pslk", "duration": 10.0, "steps": 100},
        }))
        .await;

    // Wait for the first progress notification, then cancel.
    let first = client.next_message().await;
    assert_eq!(first["event"], "progress");
    client.send(&json!({"type": "cancel", "id": 2})).await;

    loop {
        let message = client.next_message().await;
        if message["type"] == "response" {
            assert_eq!(
                message,
                json!({"type": "response", "id": 2, "result": {"status": "cancelled"}})
            );
            break;
        }
        // Notifications already in the queue may still drain first.
        assert_eq!(message["type"], "notification");
    }

    client.expect_silence(Duration::from_millis(400)).await;
}

/// The library catalog is served to the front end.
#[tokio::test]
async fn get_libraries_serves_catalog() {
    let (mut client, _handle) = start_server(default_sim_server());

    client
        .send(&json!({"type": "request", "id": 3, "method": "getLibraries"}))
        .await;

    let reply = client.next_message().await;
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["id"], 3);
    assert!(
        !reply["result"]["libraries"]
            .as_array()
            .expect("libraries must be an array")
            .is_empty(),
        "the catalog must not be empty"
    );
}

/// Render information reflects the block type's port counts.
#[tokio::test]
async fn get_block_render_information_serves_ports() {
    let (mut client, _handle) = start_server(default_sim_server());

    client
        .send(&json!({
            "type": "request",
            "id": 4,
            "method": "getBlockRenderInformation",
            "params": {"block": {"type": "Sum"}, "modelPath": "model.pslk"},
        }))
        .await;

    let reply = client.next_message().await;
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["result"]["input_ports"], 2);
    assert_eq!(reply["result"]["output_ports"], 1);
}

/// Block HTML embeds the block's label.
#[tokio::test]
async fn get_block_html_serves_markup() {
    let (mut client, _handle) = start_server(default_sim_server());

    client
        .send(&json!({
            "type": "request",
            "id": 5,
            "method": "getBlockHTML",
            "params": {"block": {"type": "Scope", "label": "Plot"}, "modelPath": "model.pslk"},
        }))
        .await;

    let reply = client.next_message().await;
    assert_eq!(reply["type"], "response");
    assert!(
        reply["result"]["html"]
            .as_str()
            .expect("html must be a string")
            .contains("Plot")
    );
}

/// When the engine cannot come up, every request is rejected with the same
/// descriptive error and no task is spawned.
#[tokio::test]
async fn unavailable_toolkit_rejects_every_request() {
    let server = sim_server(SimulationConfig {
        library_search_paths: vec![PathBuf::from("/no/such/blocks")],
    });
    let (mut client, _handle) = start_server(server);

    client
        .send(&json!({"type": "request", "id": 6, "method": "getLibraries"}))
        .await;
    let first = client.next_message().await;
    assert_eq!(first["type"], "error");
    assert_eq!(first["id"], 6);
    let description = first["error"].as_str().expect("error must be a string");
    assert!(
        description.contains("simulation toolkit unavailable"),
        "rejection must describe the bring-up failure, got: {description}"
    );

    client
        .send(&json!({"type": "request", "id": 7, "method": "getLibraries"}))
        .await;
    let second = client.next_message().await;
    assert_eq!(second["type"], "error");
    assert_eq!(
        second["error"], first["error"],
        "later rejections must repeat the original description"
    );
}

/// Unusable run parameters are answered with an error reply.
#[tokio::test]
async fn invalid_run_parameters_are_rejected() {
    let (mut client, _handle) = start_server(default_sim_server());

    client
        .send(&json!({
            "type": "request",
            "id": 8,
            "method": "runSimulation",
            "params": {"modelPath": "model.pslk", "duration": -1.0},
        }))
        .await;
    let reply = client.next_message().await;
    assert_eq!(reply["type"], "error");
    assert!(
        reply["error"]
            .as_str()
            .expect("error must be a string")
            .contains("positive"),
        "the rejection must explain the invalid duration"
    );

    client
        .send(&json!({
            "type": "request",
            "id": 9,
            "method": "runSimulation",
            "params": {},
        }))
        .await;
    let reply = client.next_message().await;
    assert_eq!(reply["type"], "error");
    assert!(
        reply["error"]
            .as_str()
            .expect("error must be a string")
            .contains("invalid parameters"),
        "a missing modelPath must be reported as invalid parameters"
    );
}
