//! Gateway configuration.
//!
//! Layered the usual way: built-in defaults, then an optional TOML file,
//! then `QMT_*` environment variables, then CLI flags (applied by the
//! binary). The operating mode is deliberately part of configuration and
//! not of any request: it is read once at startup and frozen.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::error::GatewayError;
use crate::policy::OperatingMode;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub mode: OperatingMode,
    pub log_level: String,
    pub backend: BackendConfig,
    pub rest: RestConfig,
    pub rpc: RpcConfig,
    pub audit: AuditConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::default(),
            log_level: "info".to_string(),
            backend: BackendConfig::default(),
            rest: RestConfig::default(),
            rpc: RpcConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Trading terminal endpoint, host:port.
    pub endpoint: String,
    pub establish_timeout_ms: u64,
    /// Bound on every real order submit/cancel call.
    pub order_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:58610".to_string(),
            establish_timeout_ms: 5_000,
            order_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestConfig {
    pub bind: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RpcConfig {
    pub bind: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: crate::audit::DEFAULT_AUDIT_CAPACITY,
        }
    }
}

impl GatewayConfig {
    /// Load from an optional TOML file, then apply `QMT_*` env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, GatewayError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    GatewayError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                let config: GatewayConfig = toml::from_str(&raw).map_err(|e| {
                    GatewayError::Config(format!("cannot parse {}: {e}", path.display()))
                })?;
                info!(path = %path.display(), "loaded config file");
                config
            }
            None => GatewayConfig::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), GatewayError> {
        if let Ok(mode) = std::env::var("QMT_MODE") {
            self.mode = mode.parse().map_err(GatewayError::Config)?;
        }
        if let Ok(endpoint) = std::env::var("QMT_BACKEND_ENDPOINT") {
            self.backend.endpoint = endpoint;
        }
        if let Ok(bind) = std::env::var("QMT_REST_BIND") {
            self.rest.bind = bind;
        }
        if let Ok(bind) = std::env::var("QMT_RPC_BIND") {
            self.rpc.bind = bind;
        }
        Ok(())
    }

    pub fn establish_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.establish_timeout_ms)
    }

    pub fn order_timeout(&self) -> Duration {
        Duration::from_millis(self.backend.order_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_safe() {
        let config = GatewayConfig::default();
        // Out of the box the gateway simulates everything.
        assert_eq!(config.mode, OperatingMode::Disabled);
        assert_eq!(config.backend.establish_timeout_ms, 5_000);
    }

    #[test]
    fn test_parse_full_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            mode = "live"

            [backend]
            endpoint = "10.0.0.5:58610"
            establish_timeout_ms = 2000
            order_timeout_ms = 4000

            [rest]
            bind = "0.0.0.0:8080"

            [rpc]
            bind = "0.0.0.0:9090"

            [audit]
            capacity = 128
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, OperatingMode::Live);
        assert_eq!(config.backend.endpoint, "10.0.0.5:58610");
        assert_eq!(config.establish_timeout(), Duration::from_millis(2000));
        assert_eq!(config.audit.capacity, 128);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: GatewayConfig = toml::from_str(r#"mode = "readonly""#).unwrap();
        assert_eq!(config.mode, OperatingMode::ReadOnly);
        assert_eq!(config.rest.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<GatewayConfig>(r#"mood = "live""#).is_err());
    }
}
