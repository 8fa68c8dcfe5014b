//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_connections_opened_total` (counter): admitted connections by
//!   namespace, transport
//! - `gateway_active_connections` (gauge): currently open connections by
//!   namespace, transport
//! - `gateway_connection_duration_seconds` (histogram): connection lifetime
//! - `gateway_auth_failures_total` (counter): authentication failures by
//!   namespace, classified reason
//! - `gateway_rejections_total` (counter): rejected handshakes by namespace,
//!   reason
//!
//! # Design Decisions
//! - Recording functions never fail; a broken exporter degrades to no-ops
//! - Labels are bounded sets (namespace, transport, reason codes), never
//!   per-client values, to keep cardinality under control

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install metrics exporter");
        }
    }
}

fn describe() {
    describe_counter!(
        "gateway_connections_opened_total",
        "Connections admitted past all handshake checks"
    );
    describe_gauge!(
        "gateway_active_connections",
        "Connections currently holding a lease"
    );
    describe_histogram!(
        "gateway_connection_duration_seconds",
        "Lifetime of closed connections"
    );
    describe_counter!(
        "gateway_auth_failures_total",
        "Authentication failures by classified reason"
    );
    describe_counter!(
        "gateway_rejections_total",
        "Rejected handshakes by reason"
    );
}

/// Record an admitted connection: bumps the opened counter and the
/// active-connections gauge.
pub fn record_connection_opened(namespace: &str, transport: &str) {
    counter!(
        "gateway_connections_opened_total",
        "namespace" => namespace.to_string(),
        "transport" => transport.to_string()
    )
    .increment(1);
    gauge!(
        "gateway_active_connections",
        "namespace" => namespace.to_string(),
        "transport" => transport.to_string()
    )
    .increment(1.0);
}

/// Record a closed connection: drops the gauge and records the lifetime.
pub fn record_connection_closed(namespace: &str, transport: &str, duration: Duration) {
    gauge!(
        "gateway_active_connections",
        "namespace" => namespace.to_string(),
        "transport" => transport.to_string()
    )
    .decrement(1.0);
    histogram!(
        "gateway_connection_duration_seconds",
        "namespace" => namespace.to_string(),
        "transport" => transport.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record an authentication failure with its classified reason code.
pub fn record_auth_failure(namespace: &str, reason: &'static str) {
    counter!(
        "gateway_auth_failures_total",
        "namespace" => namespace.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Record a rejected handshake with its rejection reason.
pub fn record_rejection(namespace: &str, reason: &'static str) {
    counter!(
        "gateway_rejections_total",
        "namespace" => namespace.to_string(),
        "reason" => reason
    )
    .increment(1);
}
