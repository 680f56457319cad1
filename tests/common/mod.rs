//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use api_skeleton::config::ServerConfig;
use api_skeleton::http::HttpServer;
use api_skeleton::lifecycle::Shutdown;
use api_skeleton::observability::{Encoder, Level, Logger, LoggerOptions, MemoryWriter, Sink};

/// A server running on an ephemeral port, logging into memory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub writer: Arc<MemoryWriter>,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Wait until the access log has emitted `count` records.
    #[allow(dead_code)]
    pub async fn wait_for_records(&self, count: usize) -> Vec<serde_json::Value> {
        for _ in 0..50 {
            let records = self.writer.records();
            if records.len() >= count {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.writer.records()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Logger writing JSON records at every level into a shared buffer.
pub fn memory_logger() -> (Logger, Arc<MemoryWriter>) {
    let writer = Arc::new(MemoryWriter::new());
    let logger = Logger::from_sinks(
        vec![Sink::new(writer.clone(), Encoder::Json, Level::Debug)],
        LoggerOptions {
            error_outputs: Vec::new(),
            ..LoggerOptions::default()
        },
    );
    (logger, writer)
}

/// Start the service with `routes` merged into the built-in ones.
pub async fn start_server(routes: Router) -> TestServer {
    let (logger, writer) = memory_logger();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::with_routes(ServerConfig::default(), logger, routes);
    let listener_handle = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, listener_handle).await;
    });

    TestServer {
        addr,
        writer,
        shutdown,
    }
}

/// HTTP client that never goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
