//! Configuration validation.
//!
//! Serde handles the syntactic side; this module does the semantic checks
//! and returns all validation errors, not just the first.

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            message: format!("not a socket address: {}", config.listener.bind_address),
        });
    }

    let admission = &config.admission;
    let nonzero_u64: [(&'static str, u64); 4] = [
        ("admission.handshake_window_ms", admission.handshake_window_ms),
        ("admission.handshake_cooldown_ms", admission.handshake_cooldown_ms),
        ("admission.failure_window_ms", admission.failure_window_ms),
        ("admission.failure_cooldown_ms", admission.failure_cooldown_ms),
    ];
    for (field, value) in nonzero_u64 {
        if value == 0 {
            errors.push(ValidationError {
                field,
                message: "must be greater than zero".to_string(),
            });
        }
    }

    let nonzero_usize: [(&'static str, usize); 4] = [
        ("admission.max_handshakes_per_address", admission.max_handshakes_per_address),
        ("admission.max_failures_per_address", admission.max_failures_per_address),
        ("admission.max_connections_per_identity", admission.max_connections_per_identity),
        ("admission.max_connections_per_address", admission.max_connections_per_address),
    ];
    for (field, value) in nonzero_usize {
        if value == 0 {
            errors.push(ValidationError {
                field,
                message: "must be greater than zero".to_string(),
            });
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address",
            message: format!("not a socket address: {}", config.observability.metrics_address),
        });
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError {
            field: "admin.api_key",
            message: "must be set when the admin API is enabled".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
