//! Diagnostic and admin handlers for the `/health` surface.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::health::snapshot::{ServiceHealthRecord, SystemHealthSnapshot, SystemStatus};
use crate::http::server::AppState;
use crate::resilience::circuit_breaker::CircuitBreakerSnapshot;

#[derive(Serialize)]
pub struct ServicesResponse {
    pub status: SystemStatus,
    pub services: Vec<ServiceHealthRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthResponse {
    #[serde(flatten)]
    pub system: SystemHealthSnapshot,
    pub circuit_breakers: HashMap<String, CircuitBreakerSnapshot>,
}

#[derive(Deserialize)]
pub struct ServiceHealthQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Serialize)]
struct NotFound {
    error: String,
}

fn not_found(what: &str, name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(NotFound {
            error: format!("unknown {what} '{name}'"),
        }),
    )
        .into_response()
}

/// `GET /health/live` — trivial liveness probe.
pub async fn live() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /health/services` — aggregate status plus every service record.
pub async fn list_services(State(state): State<AppState>) -> Json<ServicesResponse> {
    let snapshot = state.health.get_system_health().await;
    Json(ServicesResponse {
        status: snapshot.status,
        services: snapshot.services,
    })
}

/// `GET /health/services/{name}?force=true` — one service record;
/// `force` bypasses the cache.
pub async fn service_health(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ServiceHealthQuery>,
) -> Response {
    if !state.health.knows(&name) {
        return not_found("service", &name);
    }

    let record = if query.force {
        state.health.force_service_check(&name).await
    } else {
        match state.health.cached(&name) {
            Some(record) => Some(record),
            // Nothing cached yet for this service; check it now.
            None => state.health.force_service_check(&name).await,
        }
    };

    match record {
        Some(record) => Json(record).into_response(),
        None => not_found("service", &name),
    }
}

/// `POST /health/circuit-breakers/{name}/reset` — operator reset.
pub async fn reset_circuit(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    if state.registry.reset(&name) {
        Json(serde_json::json!({ "status": "reset", "service": name })).into_response()
    } else {
        not_found("circuit breaker", &name)
    }
}

/// `GET /health/detailed` — system snapshot plus all breaker states.
pub async fn detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let system = state.health.get_system_health().await;
    Json(DetailedHealthResponse {
        system,
        circuit_breakers: state.registry.all_snapshots(),
    })
}
