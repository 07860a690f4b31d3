//! Request-proxying subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → context.rs (correlation id, client ip, original URI)
//!     → service.rs (path rewrite, header policy, retry through the
//!       service's circuit breaker)
//!     → upstream response or synthesized error
//! ```
//!
//! # Design Decisions
//! - One ProxyService per configured backend, built at startup
//! - No state shared across requests beyond the breaker Arc
//! - The correlation id travels as an explicit context field

pub mod context;
pub mod service;

pub use context::ProxyRequestContext;
pub use service::ProxyService;
