//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use switchyard::app::{build_application, Application, Setup};
use switchyard::config::parse_config;
use switchyard::{AppConfig, HttpServer, Shutdown};

/// A server running in the background on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<AppConfig>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Build an application from `config` and `setup`, then serve it.
pub async fn spawn_server<F>(config: &str, setup: F) -> TestServer
where
    F: Fn(&mut Application) + Send + Sync + 'static,
{
    let setup: Setup = Arc::new(setup);
    let config = parse_config(config).unwrap();
    let app = build_application(config, &*setup).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (updates, update_rx) = mpsc::unbounded_channel();

    let server = HttpServer::new(app, setup);
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, update_rx, stop).await.unwrap();
    });

    TestServer { addr, shutdown, updates }
}

/// Poll `check` until it returns true or `timeout` elapses.
#[allow(dead_code)]
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}
