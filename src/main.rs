//! Subscription Gateway (v1)
//!
//! Admission control for real-time subscription channels, built with Tokio
//! and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────┐
//!                    │               SUBSCRIPTION GATEWAY              │
//!                    │                                                 │
//!   WS handshake     │  ┌─────────┐    ┌────────────┐   ┌──────────┐  │
//!   ─────────────────┼─▶│  http   │───▶│ handshake  │──▶│gatekeeper│  │
//!                    │  │ server  │    │orchestrator│   │          │  │
//!                    │  └─────────┘    └─────┬──────┘   └──────────┘  │
//!                    │                       │                        │
//!                    │                       ▼                        │
//!                    │                ┌────────────┐                  │
//!   admitted socket  │                │    auth    │ (external seam)  │
//!   ◀────────────────┼────────────────│            │                  │
//!                    │                └────────────┘                  │
//!                    │                                                 │
//!                    │  ┌───────────────────────────────────────────┐ │
//!                    │  │           Cross-Cutting Concerns           │ │
//!                    │  │  ┌────────┐ ┌─────────────┐ ┌───────────┐ │ │
//!                    │  │  │ config │ │observability│ │ lifecycle │ │ │
//!                    │  │  └────────┘ └─────────────┘ └───────────┘ │ │
//!                    │  └───────────────────────────────────────────┘ │
//!                    └────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use subscription_gateway::auth::StaticTokenAuthenticator;
use subscription_gateway::config::loader;
use subscription_gateway::lifecycle::shutdown;
use subscription_gateway::observability;
use subscription_gateway::{GatewayConfig, GatewayServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::var("GATEWAY_CONFIG") {
        Ok(path) => loader::load_config(Path::new(&path))?,
        Err(_) => {
            let mut config = GatewayConfig::default();
            loader::apply_env_overrides(&mut config);
            config
        }
    };

    observability::logging::init(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_handshakes_per_address = config.admission.max_handshakes_per_address,
        max_connections_per_address = config.admission.max_connections_per_address,
        max_connections_per_identity = config.admission.max_connections_per_identity,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let coordinator = Shutdown::new();
    let authenticator = Arc::new(StaticTokenAuthenticator::new(config.auth.api_key.clone()));
    let server = GatewayServer::new(config, authenticator);
    let server_shutdown = coordinator.subscribe();

    tokio::spawn(async move {
        shutdown::wait_for_signal().await;
        coordinator.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
