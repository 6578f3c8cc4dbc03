//! Unit tests for the outbound channel and writer task.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use syslink_server::rpc::{outbound, HeartbeatKind, OutboundMessage};

/// The writer serializes queued messages as one NDJSON line each, in queue
/// order, and exits cleanly once every sender is gone.
#[tokio::test]
async fn writer_emits_one_line_per_message_in_order() {
    let (write_half, read_half) = tokio::io::duplex(4096);
    let (tx, rx) = outbound::channel();
    let writer = tokio::spawn(outbound::run_writer(write_half, rx));

    tx.response(1, json!(42));
    tx.print("diagnostic");
    drop(tx);

    writer
        .await
        .expect("writer task must not panic")
        .expect("writer must drain cleanly");

    let mut lines = BufReader::new(read_half).lines();
    assert_eq!(
        lines.next_line().await.expect("read must succeed"),
        Some(r#"{"type":"response","id":1,"result":42}"#.to_owned())
    );
    assert_eq!(
        lines.next_line().await.expect("read must succeed"),
        Some(r#"{"type":"print","message":"diagnostic"}"#.to_owned())
    );
    assert_eq!(
        lines.next_line().await.expect("read must succeed"),
        None,
        "stream must end after the queue drains"
    );
}

/// Each sender helper queues the matching message variant.
#[tokio::test]
async fn sender_helpers_build_the_right_variants() {
    let (tx, mut rx) = outbound::channel();

    tx.error(3, "boom");
    tx.heartbeat(HeartbeatKind::Pong, 1000);
    tx.notification("progress", json!({"progress": 50}));

    assert_eq!(
        rx.recv().await,
        Some(OutboundMessage::Error {
            id: 3,
            error: "boom".to_owned(),
        })
    );
    assert_eq!(
        rx.recv().await,
        Some(OutboundMessage::Heartbeat {
            subtype: HeartbeatKind::Pong,
            timestamp: 1000,
        })
    );
    match rx.recv().await {
        Some(OutboundMessage::Notification { event, data }) => {
            assert_eq!(event, "progress");
            assert_eq!(data, json!({"progress": 50}));
        }
        other => panic!("expected a notification, got: {other:?}"),
    }
}

/// Sending after the writer side is gone drops the message instead of
/// panicking — the front end has already stopped listening.
#[tokio::test]
async fn send_after_close_is_lossy_not_fatal() {
    let (tx, rx) = outbound::channel();
    drop(rx);

    tx.print("nobody is listening");
    tx.response(1, Value::Null);
}
