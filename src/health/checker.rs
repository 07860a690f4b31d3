//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend's health endpoint
//! - Cache the latest per-service verdict for readiness and diagnostics
//! - Aggregate a system-wide status on demand
//!
//! # Design Decisions
//! - Independent of live traffic and of the circuit breaker: this is a
//!   separate signal, not derived from request outcomes
//! - Probes fan out concurrently; one hanging backend never delays or
//!   suppresses results for the others
//! - A probe never fails outward; every failure is captured in the record

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use chrono::Utc;
use dashmap::DashMap;
use futures_util::future::join_all;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::schema::{HealthCheckConfig, ServiceConfig};
use crate::health::snapshot::{
    classify, process_memory_mb, ServiceHealthRecord, ServiceStatus, SystemHealthSnapshot,
};
use crate::observability::metrics;

/// Cap on how much of a probe response body is read for `details`.
const MAX_PROBE_BODY: usize = 64 * 1024;

/// Maintains an out-of-band liveness view per backend.
pub struct HealthCheckService {
    services: Vec<ServiceConfig>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
    cache: DashMap<String, ServiceHealthRecord>,
    started_at: Instant,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl HealthCheckService {
    pub fn new(services: Vec<ServiceConfig>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            services,
            config,
            client,
            cache: DashMap::new(),
            started_at: Instant::now(),
            timer: Mutex::new(None),
        }
    }

    /// Start the periodic monitor: one immediate full sweep, then one
    /// every `interval`. Idempotent against double-start; returns false
    /// if the monitor is already running.
    pub fn start_periodic_checks(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> bool {
        let mut slot = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::warn!("Health monitor already running, ignoring start");
            return false;
        }

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            services = self.services.len(),
            "Health monitor starting"
        );

        let monitor = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            // First tick fires immediately.
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.check_all_services().await;
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Health monitor received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        }));
        true
    }

    /// Stop the periodic monitor. A later start spawns a fresh timer.
    pub fn stop_periodic_checks(&self) {
        let mut slot = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
            tracing::info!("Health monitor stopped");
        }
    }

    /// Probe one service and overwrite its cached record.
    pub async fn check_service_health(
        &self,
        name: &str,
        descriptor: &ServiceConfig,
    ) -> ServiceHealthRecord {
        let url = format!(
            "{}{}",
            descriptor.url.trim_end_matches('/'),
            descriptor.health_endpoint
        );
        let started = Instant::now();
        let outcome = self.probe(&url).await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let record = match outcome {
            Ok((status, details)) if status == 200 => ServiceHealthRecord {
                name: name.to_string(),
                status: ServiceStatus::Healthy,
                response_time_ms,
                last_checked_at: Utc::now(),
                error: None,
                details,
            },
            Ok((status, _)) => {
                tracing::warn!(service = %name, status, "Health check failed: non-200 status");
                ServiceHealthRecord {
                    name: name.to_string(),
                    status: ServiceStatus::Unhealthy,
                    response_time_ms,
                    last_checked_at: Utc::now(),
                    error: Some(format!("unexpected status {status}")),
                    details: None,
                }
            }
            Err(message) => {
                tracing::warn!(service = %name, error = %message, "Health check failed");
                ServiceHealthRecord {
                    name: name.to_string(),
                    status: ServiceStatus::Unhealthy,
                    response_time_ms,
                    last_checked_at: Utc::now(),
                    error: Some(message),
                    details: None,
                }
            }
        };

        metrics::record_service_health(name, record.status == ServiceStatus::Healthy);
        self.cache.insert(name.to_string(), record.clone());
        record
    }

    /// GET the health endpoint with the probe timeout. Classification is
    /// strict: only a 200 counts as healthy.
    async fn probe(&self, url: &str) -> Result<(u16, Option<serde_json::Value>), String> {
        let request = Request::builder()
            .method("GET")
            .uri(url)
            .header("user-agent", "service-gateway-health-check")
            .body(Body::empty())
            .map_err(|e| format!("failed to build probe request: {e}"))?;

        let response = tokio::time::timeout(self.config.timeout(), self.client.request(request))
            .await
            .map_err(|_| format!("timed out after {}ms", self.config.timeout_ms))?
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let details = if status == 200 {
            axum::body::to_bytes(Body::new(response.into_body()), MAX_PROBE_BODY)
                .await
                .ok()
                .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        } else {
            None
        };
        Ok((status, details))
    }

    /// Probe every service concurrently; returns once all have settled,
    /// in configuration order.
    pub async fn check_all_services(&self) -> Vec<ServiceHealthRecord> {
        join_all(
            self.services
                .iter()
                .map(|svc| self.check_service_health(&svc.name, svc)),
        )
        .await
    }

    /// System-wide view. An empty cache triggers a full sweep first.
    pub async fn get_system_health(&self) -> SystemHealthSnapshot {
        let services = if self.cache.is_empty() {
            self.check_all_services().await
        } else {
            self.services
                .iter()
                .filter_map(|svc| self.cache.get(&svc.name).map(|r| r.clone()))
                .collect()
        };

        SystemHealthSnapshot {
            status: classify(&services),
            services,
            uptime_seconds: self.started_at.elapsed().as_secs(),
            memory_mb: process_memory_mb(),
            timestamp: Utc::now(),
        }
    }

    /// Re-check one service unconditionally, bypassing the cache.
    /// Returns None for unknown names.
    pub async fn force_service_check(&self, name: &str) -> Option<ServiceHealthRecord> {
        let descriptor = self.services.iter().find(|svc| svc.name == name)?;
        Some(self.check_service_health(name, descriptor).await)
    }

    /// Latest cached record for one service.
    pub fn cached(&self, name: &str) -> Option<ServiceHealthRecord> {
        self.cache.get(name).map(|r| r.clone())
    }

    /// Whether a service with this name is configured.
    pub fn knows(&self, name: &str) -> bool {
        self.services.iter().any(|svc| svc.name == name)
    }

    /// Drop all cached records; the next read triggers a fresh sweep.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
