//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the subscription gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Admission-control limits (windows, cooldowns, capacity caps).
    pub admission: AdmissionConfig,

    /// Authentication settings for the built-in static-token authenticator.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Admission-control limits. Read once at Gatekeeper construction and fixed
/// for the process lifetime.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Sliding window for handshake attempts per address, in milliseconds.
    pub handshake_window_ms: u64,

    /// Maximum handshake attempts per address within the window.
    pub max_handshakes_per_address: usize,

    /// Block duration after the attempt cap is hit, in milliseconds.
    pub handshake_cooldown_ms: u64,

    /// Sliding window for authentication failures per address, in
    /// milliseconds.
    pub failure_window_ms: u64,

    /// Authentication failures within the window that trigger a block.
    pub max_failures_per_address: usize,

    /// Block duration after the failure threshold is hit, in milliseconds.
    pub failure_cooldown_ms: u64,

    /// Maximum concurrent connections per authenticated identity.
    pub max_connections_per_identity: usize,

    /// Maximum concurrent connections per source address.
    pub max_connections_per_address: usize,

    /// Interval between ledger sweeps evicting idle addresses, in seconds.
    pub ledger_sweep_interval_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            handshake_window_ms: 10_000,
            max_handshakes_per_address: 20,
            handshake_cooldown_ms: 15_000,
            failure_window_ms: 60_000,
            max_failures_per_address: 5,
            failure_cooldown_ms: 120_000,
            max_connections_per_identity: 8,
            max_connections_per_address: 12,
            ledger_sweep_interval_secs: 60,
        }
    }
}

/// Settings for the built-in static-token authenticator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared key accepted in `Bearer <key>.<subject>` tokens.
    pub api_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
