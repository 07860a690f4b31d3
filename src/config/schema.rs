//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend service definitions, keyed by name in the route path.
    pub services: Vec<ServiceConfig>,

    /// Retry backoff settings shared by all proxied services.
    pub retry: RetryConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Look up a service descriptor by name.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }
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

/// A single backend service descriptor.
///
/// Loaded once at startup and read-only afterwards; the resilience core
/// never mutates it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service name; also the routing segment in `/api/v{n}/{name}`.
    pub name: String,

    /// Base URL of the backend (e.g., "http://users:3001").
    pub url: String,

    /// Path of the backend's health endpoint.
    #[serde(default = "default_health_endpoint")]
    pub health_endpoint: String,

    /// Per-attempt deadline for proxied calls, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of attempts for a proxied call.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Consecutive failures before the circuit opens.
    #[serde(default = "default_circuit_breaker_threshold")]
    pub circuit_breaker_threshold: u32,

    /// Cooldown before an open circuit allows a probe, in milliseconds.
    #[serde(default = "default_circuit_breaker_reset_timeout_ms")]
    pub circuit_breaker_reset_timeout_ms: u64,

    /// Extra header names forwarded beyond the default set.
    #[serde(default)]
    pub preserve_headers: Vec<String>,
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn circuit_breaker_reset_timeout(&self) -> Duration {
        Duration::from_millis(self.circuit_breaker_reset_timeout_ms)
    }
}

fn default_health_endpoint() -> String {
    "/health".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retries() -> u32 {
    3
}

fn default_circuit_breaker_threshold() -> u32 {
    5
}

fn default_circuit_breaker_reset_timeout_ms() -> u64 {
    30_000
}

/// Retry backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic health monitor.
    pub enabled: bool,

    /// Interval between full check sweeps in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
            timeout_ms: 5_000,
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
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_service_gets_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [[services]]
            name = "users"
            url = "http://users:3001"
            "#,
        )
        .unwrap();

        let svc = config.service("users").unwrap();
        assert_eq!(svc.health_endpoint, "/health");
        assert_eq!(svc.timeout_ms, 30_000);
        assert_eq!(svc.retries, 3);
        assert_eq!(svc.circuit_breaker_threshold, 5);
        assert_eq!(svc.circuit_breaker_reset_timeout_ms, 30_000);
        assert!(svc.preserve_headers.is_empty());
    }

    #[test]
    fn unknown_service_lookup_is_none() {
        let config = GatewayConfig::default();
        assert!(config.service("nope").is_none());
    }
}
