//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file. Environment-variable
/// overrides are applied before validation.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: GatewayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Override admission keys from `GATEWAY_*` environment variables. The
/// admission surface is the part operators tune per deployment, so it is
/// addressable without editing the config file.
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    let admission = &mut config.admission;
    override_u64("GATEWAY_HANDSHAKE_WINDOW_MS", &mut admission.handshake_window_ms);
    override_usize(
        "GATEWAY_MAX_HANDSHAKES_PER_ADDRESS",
        &mut admission.max_handshakes_per_address,
    );
    override_u64("GATEWAY_HANDSHAKE_COOLDOWN_MS", &mut admission.handshake_cooldown_ms);
    override_u64("GATEWAY_FAILURE_WINDOW_MS", &mut admission.failure_window_ms);
    override_usize(
        "GATEWAY_MAX_FAILURES_PER_ADDRESS",
        &mut admission.max_failures_per_address,
    );
    override_u64("GATEWAY_FAILURE_COOLDOWN_MS", &mut admission.failure_cooldown_ms);
    override_usize(
        "GATEWAY_MAX_CONNECTIONS_PER_IDENTITY",
        &mut admission.max_connections_per_identity,
    );
    override_usize(
        "GATEWAY_MAX_CONNECTIONS_PER_ADDRESS",
        &mut admission.max_connections_per_address,
    );
}

fn override_u64(key: &str, target: &mut u64) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(key = %key, value = %raw, "Ignoring unparseable override"),
        }
    }
}

fn override_usize(key: &str, target: &mut usize) {
    if let Ok(raw) = std::env::var(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(key = %key, value = %raw, "Ignoring unparseable override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_gets_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.admission.max_handshakes_per_address, 20);
        assert_eq!(config.admission.handshake_window_ms, 10_000);
        assert_eq!(config.admission.max_connections_per_identity, 8);
        assert_eq!(config.admission.max_connections_per_address, 12);
    }

    #[test]
    fn toml_overrides_admission_section() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [admission]
            max_handshakes_per_address = 3
            handshake_window_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.admission.max_handshakes_per_address, 3);
        assert_eq!(config.admission.handshake_window_ms, 1_000);
        // Untouched keys keep their defaults.
        assert_eq!(config.admission.failure_cooldown_ms, 120_000);
    }
}
