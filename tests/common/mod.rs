//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use subscription_gateway::auth::StaticTokenAuthenticator;
use subscription_gateway::{GatewayConfig, GatewayServer, Shutdown};

pub const API_KEY: &str = "test-key";
pub const ADMIN_KEY: &str = "admin-key";

/// A gateway config with test keys, admin enabled, and metrics disabled.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.api_key = API_KEY.to_string();
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.to_string();
    config.observability.metrics_enabled = false;
    config
}

/// Start a gateway on an ephemeral port. The returned Shutdown must be kept
/// alive for the server's lifetime.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let authenticator = Arc::new(StaticTokenAuthenticator::new(config.auth.api_key.clone()));
    let server = GatewayServer::new(config, authenticator);

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    // Wait until the listener answers the liveness probe.
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client
            .get(format!("http://{addr}/healthz"))
            .send()
            .await
            .is_ok()
        {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    (addr, shutdown)
}

/// Build a ws upgrade request, optionally with a bearer token.
#[allow(dead_code)]
pub fn ws_request(addr: SocketAddr, namespace: &str, token: Option<&str>) -> Request {
    let mut request = format!("ws://{addr}/subscriptions/{namespace}")
        .into_client_request()
        .unwrap();
    if let Some(token) = token {
        request.headers_mut().insert(
            "authorization",
            format!("Bearer {token}").parse().unwrap(),
        );
    }
    request
}

/// Token the static authenticator accepts for `subject`.
#[allow(dead_code)]
pub fn token_for(subject: &str) -> String {
    format!("{API_KEY}.{subject}")
}
