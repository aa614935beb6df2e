//! Shared utilities for integration tests.
#![allow(dead_code)]

use axum::{http::StatusCode, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use momentum::ai::build_advisor;
use momentum::blockchain::MemoryLedger;
use momentum::config::MomentumConfig;
use momentum::http::{AppState, HttpServer};
use momentum::lifecycle::startup::memory_relayer;
use momentum::lifecycle::{assemble, Services, Shutdown};
use sdk_rust::MomentumClient;

/// A running server backed by the in-memory ledger.
pub struct TestServer {
    pub addr: SocketAddr,
    pub base_url: String,
    pub ledger: Arc<MemoryLedger>,
    pub state: AppState,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn client(&self) -> MomentumClient {
        MomentumClient::new(&self.base_url)
    }

    /// A client already logged in as `wallet`.
    pub async fn login(&self, wallet: &str) -> MomentumClient {
        let mut client = self.client();
        client.login(wallet).await.expect("login failed");
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Defaults with the remote advisor turned off.
pub fn test_config() -> MomentumConfig {
    let mut config = MomentumConfig::default();
    config.ai.enabled = false;
    config.auth.jwt_secret = "integration-test-secret-0123456789".to_string();
    config
}

/// Start the API on an ephemeral local port.
pub async fn spawn_server(config: MomentumConfig) -> TestServer {
    let ledger = Arc::new(MemoryLedger::new(memory_relayer()));
    let advisor = build_advisor(&config.ai);
    let app = assemble(&config, Services::in_memory(ledger.clone(), advisor));
    let state = app.state.clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    let server = HttpServer::new(app.state);
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    TestServer {
        addr,
        base_url: format!("http://{}", addr),
        ledger,
        state,
        shutdown,
    }
}

/// Deterministic wallet address for test user `n`.
pub fn wallet(n: u8) -> String {
    format!("0x{}", format!("{:02x}", n).repeat(20))
}

/// Fake Generative Language API answering every request the same way.
pub struct MockLlm {
    pub base_url: String,
    pub hits: Arc<AtomicUsize>,
}

impl MockLlm {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub async fn start_mock_llm(status: u16, body: Value) -> MockLlm {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let status = StatusCode::from_u16(status).unwrap();

    let app = Router::new().fallback(move || {
        let counter = counter.clone();
        let body = body.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (status, Json(body))
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockLlm {
        base_url: format!("http://{}/v1", addr),
        hits,
    }
}

/// A `generateContent` response whose single candidate says `text`.
pub fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [
            { "content": { "parts": [ { "text": text } ] } }
        ]
    })
}
