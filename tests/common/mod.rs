//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use treqs::tracer::{CaptureError, CaptureHandle, TraceBuffer, TraceCapture};
use treqs::{HttpServer, Shutdown, TraceClient, TraceCoordinator};

pub const KEY: &str = "s3cr3t";

/// Writes fixed markers on start and stop.
#[allow(dead_code)]
pub struct ScriptedCapture;

impl TraceCapture for ScriptedCapture {
    fn start(&self, sink: TraceBuffer) -> Result<CaptureHandle, CaptureError> {
        sink.append(b"start\n");
        Ok(CaptureHandle::new(move || sink.append(b"stop\n")))
    }
}

/// Serve `app` behind a coordinator on an ephemeral port.
pub async fn start_server(capture: Arc<dyn TraceCapture>, app: Router) -> (SocketAddr, Shutdown) {
    let coordinator = Arc::new(TraceCoordinator::new(KEY, capture));
    let server = HttpServer::new(coordinator, app);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, shutdown)
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

#[allow(dead_code)]
pub fn trace_client(addr: SocketAddr, path: &str, key: &str) -> TraceClient {
    TraceClient::new(format!("http://{}{}", addr, path), key).with_http_client(http_client())
}
