//! Health record and snapshot types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-service verdict. The check itself is binary; "degraded" exists
/// only as a system-level aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
}

/// Latest verdict for one service. Overwritten on every check cycle;
/// no history is retained.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthRecord {
    pub name: String,
    pub status: ServiceStatus,
    pub response_time_ms: u64,
    pub last_checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// JSON body of a 200 probe response, when it parses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// System-wide aggregate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Aggregate rule: more than half unhealthy ⇒ unhealthy; any unhealthy
/// ⇒ degraded; otherwise healthy (an empty list is healthy).
pub fn classify(records: &[ServiceHealthRecord]) -> SystemStatus {
    let unhealthy = records
        .iter()
        .filter(|r| r.status == ServiceStatus::Unhealthy)
        .count();
    if unhealthy * 2 > records.len() {
        SystemStatus::Unhealthy
    } else if unhealthy > 0 {
        SystemStatus::Degraded
    } else {
        SystemStatus::Healthy
    }
}

/// Point-in-time system view; computed on demand, never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealthSnapshot {
    pub status: SystemStatus,
    pub services: Vec<ServiceHealthRecord>,
    pub uptime_seconds: u64,
    pub memory_mb: u64,
    pub timestamp: DateTime<Utc>,
}

/// Resident set size of this process in megabytes; 0 where the proc
/// filesystem is unavailable.
pub fn process_memory_mb() -> u64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(statm) = std::fs::read_to_string("/proc/self/statm") {
            if let Some(resident_pages) = statm
                .split_whitespace()
                .nth(1)
                .and_then(|v| v.parse::<u64>().ok())
            {
                return resident_pages * 4096 / (1024 * 1024);
            }
        }
    }
    0
}
