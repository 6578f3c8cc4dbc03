//! Shared helpers for driving the full server over in-memory pipes.
//!
//! Each test builds an [`RpcServer`], hands it a pair of duplex streams via
//! [`start_server`], and talks the wire protocol through the returned
//! [`TestClient`] exactly as the real front end would over stdio.

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;

use syslink_server::rpc::RpcServer;
use syslink_server::{Result, ServerConfig};

/// Default timeout for reading one message off the wire.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// A heartbeat interval long enough to never fire during a test.
pub const QUIET_HEARTBEAT: Duration = Duration::from_secs(3600);

/// Default-configured server whose heartbeat stays out of the way.
pub fn quiet_server() -> RpcServer {
    RpcServer::new(&ServerConfig::default()).with_heartbeat_interval(QUIET_HEARTBEAT)
}

/// Front-end side of a running server.
pub struct TestClient {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
}

impl TestClient {
    /// Write one raw line (newline appended) to the server's input.
    pub async fn send_line(&mut self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.input
            .write_all(&bytes)
            .await
            .expect("write to server input must succeed");
    }

    /// Serialize and send one JSON message.
    pub async fn send(&mut self, message: &Value) {
        let line = serde_json::to_string(message).expect("test message must serialize");
        self.send_line(&line).await;
    }

    /// Read the next message, panicking after [`READ_TIMEOUT`].
    pub async fn next_message(&mut self) -> Value {
        let line = tokio::time::timeout(READ_TIMEOUT, self.output.next_line())
            .await
            .expect("server must produce a message before the timeout")
            .expect("server output stream must stay readable")
            .expect("server output must not be at EOF");
        serde_json::from_str(&line).expect("server output must be valid JSON")
    }

    /// Read messages until one is not a heartbeat ping.
    pub async fn next_non_heartbeat(&mut self) -> Value {
        loop {
            let message = self.next_message().await;
            if message["type"] != "heartbeat" {
                return message;
            }
        }
    }

    /// Assert that no message arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        let result = tokio::time::timeout(window, self.output.next_line()).await;
        assert!(
            result.is_err(),
            "expected no output, got: {:?}",
            result.expect("timeout already checked")
        );
    }

    /// Close the server's input stream, signalling end of input.
    pub async fn close_input(&mut self) {
        self.input
            .shutdown()
            .await
            .expect("closing server input must succeed");
    }

    /// Read the next raw output line, `None` at end of stream.
    pub async fn next_line_raw(&mut self) -> Option<String> {
        tokio::time::timeout(READ_TIMEOUT, self.output.next_line())
            .await
            .expect("server must close or produce output before the timeout")
            .expect("server output stream must stay readable")
    }
}

/// Spawn `server` over in-memory pipes and return the client end.
pub fn start_server(server: RpcServer) -> (TestClient, JoinHandle<Result<()>>) {
    let (client_input, server_input) = tokio::io::duplex(64 * 1024);
    let (server_output, client_output) = tokio::io::duplex(64 * 1024);

    let handle = tokio::spawn(server.serve(server_input, server_output));

    let client = TestClient {
        input: client_input,
        output: BufReader::new(client_output).lines(),
    };
    (client, handle)
}
