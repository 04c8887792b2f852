//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use support_relay::config::StorageConfig;
use support_relay::store::MappingStore;

/// One request received by the mock Bot API.
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub method: String,
    pub body: Value,
}

/// Handle to a running mock Bot API.
#[allow(dead_code)]
pub struct MockBotApi {
    pub addr: SocketAddr,
    calls: Arc<Mutex<Vec<ApiCall>>>,
}

#[allow(dead_code)]
impl MockBotApi {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls to `method`, in arrival order.
    pub fn calls_to(&self, method: &str) -> Vec<ApiCall> {
        self.calls().into_iter().filter(|c| c.method == method).collect()
    }
}

/// Start a programmable Bot API on an ephemeral port. `handler` receives each
/// call and returns the JSON envelope to send back.
#[allow(dead_code)]
pub async fn start_mock_bot_api<F, Fut>(handler: F) -> MockBotApi
where
    F: Fn(ApiCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Value> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let recorded = calls.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let handler = handler.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        let _ = serve_one(socket, handler, recorded).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBotApi { addr, calls }
}

async fn serve_one<F, Fut>(
    mut socket: TcpStream,
    handler: Arc<F>,
    recorded: Arc<Mutex<Vec<ApiCall>>>,
) -> std::io::Result<()>
where
    F: Fn(ApiCall) -> Fut,
    Fut: Future<Output = Value>,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let path = head.split_whitespace().nth(1).unwrap_or_default();
    let method = path.rsplit('/').next().unwrap_or_default().to_string();
    let end = (body_start + content_length).min(buf.len());
    let body = serde_json::from_slice(&buf[body_start..end]).unwrap_or(Value::Null);

    let call = ApiCall { method, body };
    recorded.lock().unwrap().push(call.clone());

    let payload = handler(call).await.to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        payload.len(),
        payload
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Storage settings pointing into a fresh temporary directory.
#[allow(dead_code)]
pub fn temp_storage(max_connections: usize) -> (TempDir, StorageConfig) {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageConfig {
        data_dir: dir.path().to_path_buf(),
        max_connections,
        ..StorageConfig::default()
    };
    (dir, storage)
}

/// An initialized store in a temporary directory. Keep the `TempDir` alive.
#[allow(dead_code)]
pub async fn ready_store(max_connections: usize) -> (TempDir, Arc<MappingStore>) {
    let (dir, storage) = temp_storage(max_connections);
    let store = Arc::new(MappingStore::new(&storage));
    store.initialize().await.unwrap();
    (dir, store)
}
