//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (checker.rs):
//!     → probe each backend's health endpoint concurrently
//!     → overwrite per-service record in the cache
//!
//! Readiness / diagnostics:
//!     → read cached records
//!     → snapshot.rs aggregates a system-wide status
//! ```
//!
//! # Design Decisions
//! - Health state is per-service and process-local
//! - The signal is decoupled from live traffic and from the breaker
//! - No history: each cycle overwrites the previous record

pub mod checker;
pub mod snapshot;

pub use checker::HealthCheckService;
pub use snapshot::{ServiceHealthRecord, ServiceStatus, SystemHealthSnapshot, SystemStatus};
