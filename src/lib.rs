//! Resilient API gateway library.
//!
//! Routes client requests to independently deployed backend services
//! while surviving partial backend failure.
//!
//! # Architecture Overview
//!
//! ```text
//! inbound /api/v{n}/{service}/...          /health/* diagnostics
//!        │                                        │
//!        ▼                                        ▼
//!   http::server ──▶ proxy::ProxyService     http::handlers
//!                        │                        │
//!                        ▼                        ▼
//!              resilience::CircuitBreaker   health::HealthCheckService
//!              (fail fast / retry+backoff)  (periodic probes, cache)
//!                        │
//!                        ▼
//!                 backend service
//! ```
//!
//! Cross-cutting: config (TOML, validated at startup), observability
//! (tracing + Prometheus metrics), lifecycle (broadcast shutdown).

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod proxy;

// Failure handling
pub mod health;
pub mod resilience;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
