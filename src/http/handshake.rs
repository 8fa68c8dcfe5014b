//! Handshake orchestration for subscription connections.
//!
//! Sequences the Gatekeeper and the external Authenticator around each
//! inbound WebSocket upgrade, and ties lease lifetime to the socket's
//! close/error lifecycle. Every failure path is terminal for the attempt;
//! retry is the connecting client's responsibility.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Path, State,
    },
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::admission::{AdmissionError, ConnectionId, Gatekeeper, ReleaseHandle};
use crate::auth::{classify_failure, Identity};
use crate::http::server::AppState;
use crate::observability::metrics;

/// Transport label for metrics. The gateway fronts a single transport today.
const TRANSPORT: &str = "websocket";

/// Entry point for `GET /subscriptions/{namespace}`.
///
/// Admission sequence: resolve address → rate check → authenticate → open
/// lease → upgrade. The only await before admission is the authenticator
/// call; concurrent handshakes may interleave there, which is accepted
/// ("first N win" per address).
pub async fn handshake_handler(
    ws: WebSocketUpgrade,
    Path(namespace): Path<String>,
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let connection_id = ConnectionId::new();
    let address = resolve_client_address(&headers, Some(peer));

    tracing::info!(
        connection_id = %connection_id,
        address = %address,
        namespace = %namespace,
        "Handshake received"
    );

    if let Err(err) = state.gatekeeper.assert_handshake_allowed(&address, &namespace) {
        tracing::warn!(
            connection_id = %connection_id,
            address = %address,
            namespace = %namespace,
            error = %err,
            "Handshake rejected: rate limited"
        );
        metrics::record_rejection(&namespace, "rate_limited");
        return rate_limited_response(&err);
    }

    let params = connection_params(&headers, &uri);
    let identity = match state.authenticator.authenticate(&params).await {
        Ok(identity) => identity,
        Err(err) => {
            let reason = classify_failure(&err.to_string());
            state.gatekeeper.record_handshake_failure(&address, &namespace);
            metrics::record_auth_failure(&namespace, reason);
            metrics::record_rejection(&namespace, "auth_failed");
            tracing::warn!(
                connection_id = %connection_id,
                address = %address,
                namespace = %namespace,
                reason = reason,
                "Handshake rejected: authentication failed"
            );
            return (StatusCode::UNAUTHORIZED, "authentication failed").into_response();
        }
    };

    let handle = match state.gatekeeper.open_lease(
        connection_id,
        &address,
        Some(identity.clone()),
        &namespace,
    ) {
        Ok(handle) => handle,
        Err(err) => {
            // Capacity rejection is not evidence of a malicious client, so
            // no failure ledger entry here. The attempt slot consumed by the
            // rate check above stays consumed.
            metrics::record_rejection(&namespace, "capacity_exceeded");
            tracing::warn!(
                connection_id = %connection_id,
                address = %address,
                identity = %identity,
                namespace = %namespace,
                error = %err,
                "Handshake rejected: capacity exceeded"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, "connection capacity exceeded")
                .into_response();
        }
    };

    metrics::record_connection_opened(&namespace, TRANSPORT);
    tracing::info!(
        connection_id = %connection_id,
        address = %address,
        identity = %identity,
        namespace = %namespace,
        "Connection admitted"
    );

    let gatekeeper = Arc::clone(&state.gatekeeper);
    let ctx = SessionContext {
        id: connection_id,
        identity,
        namespace,
        opened_at: Instant::now(),
    };
    ws.on_upgrade(move |socket| run_session(socket, gatekeeper, handle, ctx))
}

struct SessionContext {
    id: ConnectionId,
    identity: Identity,
    namespace: String,
    opened_at: Instant,
}

/// Drive an admitted socket until it closes or errors, then release.
async fn run_session(
    mut socket: WebSocket,
    gatekeeper: Arc<Gatekeeper>,
    handle: ReleaseHandle,
    ctx: SessionContext,
) {
    loop {
        match socket.recv().await {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                gatekeeper.mark_heartbeat(ctx.id);
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {
                // Application messages belong to the subscription engine;
                // the admission layer does not route them.
            }
            Some(Err(err)) => {
                tracing::debug!(connection_id = %ctx.id, error = %err, "Socket error");
                break;
            }
        }
    }
    finish_session(&handle, &ctx);
}

/// One-shot close bookkeeping. Clean close and error both funnel here; the
/// release handle guarantees the gauge decrement and close log fire once.
fn finish_session(handle: &ReleaseHandle, ctx: &SessionContext) {
    if !handle.release() {
        return;
    }
    let duration = ctx.opened_at.elapsed();
    metrics::record_connection_closed(&ctx.namespace, TRANSPORT, duration);
    tracing::info!(
        connection_id = %ctx.id,
        identity = %ctx.identity,
        namespace = %ctx.namespace,
        duration_ms = duration.as_millis() as u64,
        "Connection closed"
    );
}

/// Resolve the client address: first `x-forwarded-for` entry, then the
/// socket peer address, then the literal `"unknown"`.
///
/// The forwarded header is not validated against a trusted-proxy allowlist,
/// so a client behind no proxy can spoof its per-address bucket.
pub(crate) fn resolve_client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

/// Assemble connection params from the upgrade request: the authorization
/// header plus URI query pairs, values as JSON strings.
pub(crate) fn connection_params(headers: &HeaderMap, uri: &Uri) -> HashMap<String, Value> {
    let mut params = HashMap::new();

    if let Some(authorization) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        params.insert(
            "authorization".to_string(),
            Value::String(authorization.to_string()),
        );
    }

    if let Some(query) = uri.query() {
        for pair in query.split('&') {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or("");
            if key.is_empty() {
                continue;
            }
            params.insert(
                key.to_string(),
                Value::String(parts.next().unwrap_or("").to_string()),
            );
        }
    }

    params
}

fn rate_limited_response(err: &AdmissionError) -> Response {
    let retry_after_secs = match err {
        AdmissionError::RateLimited { retry_after_ms, .. } => (retry_after_ms / 1_000).max(1),
        _ => 1,
    };
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after_secs.to_string())],
        "handshake rate limit exceeded",
    )
        .into_response()
}
