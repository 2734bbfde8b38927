//! Mock vdcd controller for client integration tests
//!
//! Binds a real TCP listener on loopback so the full wire path is
//! exercised: CRLF framing, JSON shape and reconnects.

#![allow(dead_code)]

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::timeout;
use vdcd_client::{ClientConfig, VdcdClient};

/// How long to wait for something that is expected to happen
pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// How long to wait before concluding that nothing was sent
pub const SILENCE: Duration = Duration::from_millis(200);

pub struct MockController {
    listener: TcpListener,
}

impl MockController {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self { listener }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    /// Client settings pointing at this controller with a short dial budget
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new("127.0.0.1", self.port(), "test-model", "test-vendor", false)
            .with_dial_retries(3)
            .with_dial_backoff(Duration::from_millis(20))
    }

    pub async fn accept(&self) -> ControllerConnection {
        let (stream, _) = timeout(RECV_TIMEOUT, self.listener.accept())
            .await
            .expect("client did not connect")
            .unwrap();
        let (read, write) = stream.into_split();
        ControllerConnection {
            reader: BufReader::new(read),
            writer: write,
        }
    }
}

/// Controller side of one client connection
pub struct ControllerConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ControllerConnection {
    /// Next raw line including its terminator
    pub async fn recv_line(&mut self) -> String {
        let mut line = String::new();
        let read = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a message")
            .unwrap();
        assert!(read > 0, "connection closed while waiting for a message");
        line
    }

    /// Next message, checking the CRLF terminator
    pub async fn recv(&mut self) -> Value {
        let line = self.recv_line().await;
        let body = line
            .strip_suffix("\r\n")
            .unwrap_or_else(|| panic!("line not CRLF terminated: {line:?}"));
        serde_json::from_str(body).unwrap()
    }

    /// Assert that no message arrives within [`SILENCE`]
    pub async fn expect_silence(&mut self) {
        let mut line = String::new();
        if let Ok(result) = timeout(SILENCE, self.reader.read_line(&mut line)).await {
            let read = result.unwrap();
            assert!(read == 0, "unexpected message: {line:?}");
        }
    }

    /// Assert that the client closed its side of the connection
    pub async fn expect_eof(&mut self) {
        let mut line = String::new();
        let read = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for EOF")
            .unwrap();
        assert_eq!(read, 0, "unexpected message: {line:?}");
    }

    pub async fn send(&mut self, message: &Value) {
        self.send_raw(&format!("{}\r\n", message)).await;
    }

    pub async fn send_raw(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }
}

/// Connect a fresh client to `controller` and accept its connection
pub async fn connected_client(
    controller: &MockController,
    config: ClientConfig,
) -> (Arc<VdcdClient>, ControllerConnection) {
    let client = Arc::new(VdcdClient::new(config));
    client.connect().await.unwrap();
    let conn = controller.accept().await;
    (client, conn)
}

/// Poll `check` until it holds or the receive timeout passes
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while !check() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
