//! HTTP surface of the gateway.
//!
//! # Responsibilities
//! - Axum router and server lifecycle (server.rs)
//! - Diagnostic and admin handlers under /health (handlers.rs)

pub mod handlers;
pub mod server;

pub use server::GatewayServer;
