//! Lifecycle management subsystem.
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Shutdown fans out over a broadcast channel so the server and the
//!   health monitor stop together

pub mod shutdown;

pub use shutdown::Shutdown;
