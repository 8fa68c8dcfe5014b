use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub active_connections: usize,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub id: String,
    pub address: String,
    pub identity: Option<String>,
    pub namespace: String,
    pub age_secs: u64,
    pub idle_secs: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        active_connections: state.gatekeeper.list_connections().len(),
    })
}

pub async fn get_connections(State(state): State<AppState>) -> Json<Vec<ConnectionInfo>> {
    let connections = state
        .gatekeeper
        .list_connections()
        .into_iter()
        .map(|(id, lease)| ConnectionInfo {
            id: id.to_string(),
            address: lease.address,
            identity: lease.identity.map(|identity| identity.as_str().to_string()),
            namespace: lease.namespace,
            age_secs: lease.opened_at.elapsed().as_secs(),
            idle_secs: lease.last_seen_at.elapsed().as_secs(),
        })
        .collect();

    Json(connections)
}
