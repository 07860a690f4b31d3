//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the per-service proxies, breaker registry and health monitor
//! - Create the Axum router: proxy routes plus the /health surface
//! - Wire up middleware (tracing) and graceful shutdown
//! - Dispatch `/api/v{n}/{service}` requests to the matching proxy

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::{any, get, post};
use axum::Router;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::error_response;
use crate::health::HealthCheckService;
use crate::http::handlers;
use crate::lifecycle::Shutdown;
use crate::proxy::context::CORRELATION_ID_HEADER;
use crate::proxy::ProxyService;
use crate::resilience::{CircuitBreakerConfig, CircuitBreakerRegistry};

/// Largest request body buffered for retry replay.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub proxies: Arc<HashMap<String, Arc<ProxyService>>>,
    pub registry: Arc<CircuitBreakerRegistry>,
    pub health: Arc<HealthCheckService>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    health: Arc<HealthCheckService>,
}

impl GatewayServer {
    /// Build all subsystems from a validated configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let registry = Arc::new(CircuitBreakerRegistry::new());
        let client: Client<HttpConnector, Body> =
            Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let proxies: HashMap<String, Arc<ProxyService>> = config
            .services
            .iter()
            .map(|svc| {
                let breaker = registry.get_or_create(
                    &svc.name,
                    CircuitBreakerConfig {
                        failure_threshold: svc.circuit_breaker_threshold,
                        reset_timeout: svc.circuit_breaker_reset_timeout(),
                        call_timeout: None,
                    },
                );
                let proxy = Arc::new(ProxyService::new(
                    svc.clone(),
                    config.retry.clone(),
                    breaker,
                    client.clone(),
                ));
                (svc.name.clone(), proxy)
            })
            .collect();

        let health = Arc::new(HealthCheckService::new(
            config.services.clone(),
            config.health_check.clone(),
        ));

        let state = AppState {
            proxies: Arc::new(proxies),
            registry,
            health: health.clone(),
        };

        let router = Self::build_router(state);
        Self {
            router,
            config,
            health,
        }
    }

    /// Build the Axum router with all routes and middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/health/live", get(handlers::live))
            .route("/health/services", get(handlers::list_services))
            .route("/health/services/{name}", get(handlers::service_health))
            .route(
                "/health/circuit-breakers/{name}/reset",
                post(handlers::reset_circuit),
            )
            .route("/health/detailed", get(handlers::detailed))
            .route("/api/{version}/{service}", any(proxy_handler))
            .route("/api/{version}/{service}/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: Arc<Shutdown>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        if self.config.health_check.enabled {
            self.health
                .start_periodic_checks(self.config.health_check.interval(), shutdown.subscribe());
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut stop = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = stop.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                tracing::info!("Shutdown signal received");
            })
            .await?;

        self.health.stop_periodic_checks();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Main proxy handler: resolve the service from the path, buffer the
/// body for retry replay, and hand off to the service's proxy.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Path shape is /api/{version}/{service}[/...]; the router guarantees
    // at least three segments.
    let service_name = request
        .uri()
        .path()
        .trim_start_matches('/')
        .split('/')
        .nth(2)
        .unwrap_or_default()
        .to_string();

    let Some(proxy) = state.proxies.get(&service_name).cloned() else {
        tracing::warn!(
            service = %service_name,
            path = %request.uri().path(),
            correlation_id = %correlation_id,
            "No such service"
        );
        return error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Unknown service '{service_name}'"),
            &correlation_id,
        );
    };

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                service = %service_name,
                error = %e,
                correlation_id = %correlation_id,
                "Failed to buffer request body"
            );
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_SERVER_ERROR",
                "Internal server error",
                &correlation_id,
            );
        }
    };

    proxy.handle(parts, bytes, addr.ip()).await
}
