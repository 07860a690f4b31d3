//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Proxied call to a backend:
//!     → registry.rs (look up the service's circuit breaker)
//!     → circuit_breaker.rs (fail fast while open, else admit)
//!     → per-attempt deadline + backoff.rs between retries
//!     → outcome recorded back into the breaker
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only for transport failures, timeouts and 5xx responses
//! - Circuit breaker prevents cascading failures; its fail-fast path
//!   bypasses retry entirely
//! - Backoff is deterministic (no jitter), preserved from the source policy

pub mod backoff;
pub mod circuit_breaker;
pub mod registry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, CircuitState};
pub use registry::CircuitBreakerRegistry;
