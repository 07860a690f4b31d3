//! Configuration validation.
//!
//! Serde handles syntactic checks; this module covers semantics:
//! unique service names, resolvable base URLs, sane thresholds.
//! All errors are collected and returned together, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic configuration error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("listener bind_address '{0}' is not a valid socket address")]
    InvalidBindAddress(String),

    #[error("service at index {0} has an empty name")]
    EmptyServiceName(usize),

    #[error("duplicate service name '{0}'")]
    DuplicateServiceName(String),

    #[error("service '{service}': '{url}' is not a valid http(s) base URL")]
    InvalidServiceUrl { service: String, url: String },

    #[error("service '{service}': health_endpoint '{endpoint}' must start with '/'")]
    InvalidHealthEndpoint { service: String, endpoint: String },

    #[error("service '{service}': {field} must be at least 1")]
    ZeroValue {
        service: String,
        field: &'static str,
    },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for (i, svc) in config.services.iter().enumerate() {
        if svc.name.is_empty() {
            errors.push(ValidationError::EmptyServiceName(i));
            continue;
        }
        if !seen.insert(svc.name.as_str()) {
            errors.push(ValidationError::DuplicateServiceName(svc.name.clone()));
        }

        match Url::parse(&svc.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => errors.push(ValidationError::InvalidServiceUrl {
                service: svc.name.clone(),
                url: svc.url.clone(),
            }),
        }

        if !svc.health_endpoint.starts_with('/') {
            errors.push(ValidationError::InvalidHealthEndpoint {
                service: svc.name.clone(),
                endpoint: svc.health_endpoint.clone(),
            });
        }

        // retries may be 0 (single attempt, no retry).
        for (field, value) in [
            ("timeout_ms", svc.timeout_ms),
            ("circuit_breaker_threshold", u64::from(svc.circuit_breaker_threshold)),
            (
                "circuit_breaker_reset_timeout_ms",
                svc.circuit_breaker_reset_timeout_ms,
            ),
        ] {
            if value == 0 {
                errors.push(ValidationError::ZeroValue {
                    service: svc.name.clone(),
                    field,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ServiceConfig;

    fn service(name: &str, url: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.to_string(),
            url: url.to_string(),
            health_endpoint: "/health".to_string(),
            timeout_ms: 5000,
            retries: 3,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_timeout_ms: 30_000,
            preserve_headers: Vec::new(),
        }
    }

    #[test]
    fn valid_config_passes() {
        let mut config = GatewayConfig::default();
        config.services.push(service("users", "http://users:3001"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-addr".to_string();
        config.services.push(service("users", "ftp://users:21"));
        config.services.push(service("users", "http://dup:1"));
        let mut bad = service("orders", "http://orders:3002");
        bad.health_endpoint = "health".to_string();
        bad.circuit_breaker_threshold = 0;
        config.services.push(bad);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
    }
}
