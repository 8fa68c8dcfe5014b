//! Gateway server setup.
//!
//! # Responsibilities
//! - Create the Axum router (subscription upgrade route, liveness probe,
//!   bearer-guarded admin surface)
//! - Spawn the periodic ledger sweeper
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::admission::Gatekeeper;
use crate::auth::Authenticator;
use crate::config::GatewayConfig;
use crate::http::handshake;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gatekeeper: Arc<Gatekeeper>,
    pub authenticator: Arc<dyn Authenticator>,
    pub config: Arc<GatewayConfig>,
}

/// HTTP/WebSocket server for the subscription gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    gatekeeper: Arc<Gatekeeper>,
}

impl GatewayServer {
    /// Create a new gateway server with the given configuration and
    /// authenticator.
    pub fn new(config: GatewayConfig, authenticator: Arc<dyn Authenticator>) -> Self {
        let gatekeeper = Arc::new(Gatekeeper::new(config.admission.clone()));
        let state = AppState {
            gatekeeper: Arc::clone(&gatekeeper),
            authenticator,
            config: Arc::new(config.clone()),
        };
        let router = Self::build_router(state);
        Self {
            router,
            config,
            gatekeeper,
        }
    }

    /// Build the Axum router.
    fn build_router(state: AppState) -> Router {
        let mut router = Router::new()
            .route("/subscriptions/{namespace}", get(handshake::handshake_handler))
            .route("/healthz", get(healthz));

        if state.config.admin.enabled {
            let admin_routes = Router::new()
                .route("/admin/status", get(admin::handlers::get_status))
                .route("/admin/connections", get(admin::handlers::get_connections))
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    admin::auth::admin_auth_middleware,
                ));
            router = router.merge(admin_routes);
        }

        router.with_state(state).layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until the
    /// shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway server starting");

        self.spawn_ledger_sweeper(shutdown.resubscribe());

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }

    /// Periodically evict idle ledger entries so addresses that stop
    /// connecting do not grow the ledger forever.
    fn spawn_ledger_sweeper(&self, mut shutdown: broadcast::Receiver<()>) {
        let interval = Duration::from_secs(self.config.admission.ledger_sweep_interval_secs.max(1));
        let gatekeeper = Arc::clone(&self.gatekeeper);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the first tick completes immediately
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = gatekeeper.sweep_ledger();
                        if evicted > 0 {
                            tracing::debug!(evicted, "Ledger sweep evicted idle addresses");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Shared handle to the admission state, for diagnostics.
    pub fn gatekeeper(&self) -> Arc<Gatekeeper> {
        Arc::clone(&self.gatekeeper)
    }
}

/// Liveness probe for load balancers.
async fn healthz() -> &'static str {
    "ok"
}
