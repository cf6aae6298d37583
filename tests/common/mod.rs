//! Shared utilities for integration tests.

use std::time::Duration;

use telemetry_gateway::routing::{HandlerMap, RouteSchema};
use telemetry_gateway::{launch, GatewayConfig, Server};

/// Default config bound to an ephemeral loopback port.
pub fn loopback_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.web.server = "127.0.0.1:0".to_string();
    config.version = "0.0.0-test".to_string();
    config
}

/// Launch a gateway serving `schema` with `handlers`.
pub async fn start_gateway(schema: &str, handlers: HandlerMap) -> Server {
    let schema = RouteSchema::from_json(schema).unwrap();
    launch(&loopback_config(), &schema, &handlers).await.unwrap()
}

pub fn url(server: &Server, path: &str) -> String {
    format!("http://{}{}", server.local_addr(), path)
}

/// Client that never pools, so each test sees fresh connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Fail the test instead of hanging on a future that never completes.
#[allow(dead_code)]
pub async fn within<F: std::future::Future>(secs: u64, future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(secs), future)
        .await
        .expect("timed out")
}
