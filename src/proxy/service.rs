//! Request-proxying engine.
//!
//! # Responsibilities
//! - Rewrite the inbound routing path to the backend path
//! - Apply the header forwarding policy
//! - Drive the retry loop through the service's circuit breaker
//! - Map every failure mode to a stable, client-safe error response
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → ProxyRequestContext (correlation id, client ip)
//!     → CircuitBreaker.execute
//!         → attempt loop: deadline per attempt, backoff between attempts
//!     → upstream response forwarded verbatim, or synthesized JSON error
//! ```

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{request::Parts, HeaderMap, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::{connect::HttpConnector, Client};

use crate::config::schema::{RetryConfig, ServiceConfig};
use crate::error::{error_response, GatewayError};
use crate::observability::metrics;
use crate::proxy::context::{ProxyRequestContext, CORRELATION_ID_HEADER};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::CircuitBreaker;

/// Headers forwarded from the inbound request when present, beyond the
/// ones the gateway sets itself.
const PASSTHROUGH_HEADERS: [&str; 2] = ["authorization", "content-type"];

/// Upper bound when buffering a 5xx upstream body for possible forwarding.
const MAX_UPSTREAM_ERROR_BODY: usize = 1024 * 1024;

/// One proxy per configured backend service, built at startup.
pub struct ProxyService {
    descriptor: ServiceConfig,
    /// Base URL with any trailing slash removed.
    base_url: String,
    breaker: Arc<CircuitBreaker>,
    client: Client<HttpConnector, Body>,
    retry: RetryConfig,
    preserve: Vec<HeaderName>,
}

impl ProxyService {
    pub fn new(
        descriptor: ServiceConfig,
        retry: RetryConfig,
        breaker: Arc<CircuitBreaker>,
        client: Client<HttpConnector, Body>,
    ) -> Self {
        let preserve = descriptor
            .preserve_headers
            .iter()
            .filter_map(|name| match HeaderName::from_str(name) {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    tracing::warn!(
                        service = %descriptor.name,
                        header = %name,
                        "Ignoring invalid preserve_headers entry"
                    );
                    None
                }
            })
            .collect();

        let base_url = descriptor.url.trim_end_matches('/').to_string();

        Self {
            descriptor,
            base_url,
            breaker,
            client,
            retry,
            preserve,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Proxy one inbound request and produce the client response.
    ///
    /// Never fails outward: every error is mapped to a response carrying
    /// the correlation id.
    pub async fn handle(&self, parts: Parts, body: Bytes, client_ip: IpAddr) -> Response {
        let ctx = ProxyRequestContext::new(&parts, client_ip);
        let target = self.target_uri_string(&ctx);
        let started = Instant::now();

        tracing::info!(
            service = %self.descriptor.name,
            method = %ctx.method,
            path = %ctx.path,
            target = %target,
            correlation_id = %ctx.correlation_id,
            "Proxying request"
        );

        let result = self
            .breaker
            .execute(&ctx.correlation_id, || {
                self.attempt_loop(&ctx, &target, &body)
            })
            .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let response = match result {
            Ok(response) => {
                tracing::info!(
                    service = %self.descriptor.name,
                    method = %ctx.method,
                    path = %ctx.path,
                    status = response.status().as_u16(),
                    duration_ms,
                    correlation_id = %ctx.correlation_id,
                    "Proxied request completed"
                );
                response
            }
            Err(err) => {
                tracing::warn!(
                    service = %self.descriptor.name,
                    method = %ctx.method,
                    path = %ctx.path,
                    error = %err,
                    duration_ms,
                    correlation_id = %ctx.correlation_id,
                    "Proxied request failed"
                );
                self.failure_response(err, &ctx)
            }
        };

        metrics::record_request(
            &self.descriptor.name,
            ctx.method.as_str(),
            response.status().as_u16(),
            started,
        );
        response
    }

    /// Bounded retry: transport failures, timeouts and 5xx responses are
    /// retried with deterministic backoff; anything below 500 is terminal.
    /// `retries` counts retries after the initial attempt.
    async fn attempt_loop(
        &self,
        ctx: &ProxyRequestContext,
        target: &str,
        body: &Bytes,
    ) -> Result<Response, GatewayError> {
        let max_attempts = self.descriptor.retries.saturating_add(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(ctx, target, body).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay =
                        calculate_backoff(attempt, self.retry.base_delay_ms, self.retry.max_delay_ms);
                    tracing::info!(
                        service = %self.descriptor.name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        correlation_id = %ctx.correlation_id,
                        "Retrying upstream call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One outbound attempt with its own deadline.
    async fn attempt(
        &self,
        ctx: &ProxyRequestContext,
        target: &str,
        body: &Bytes,
    ) -> Result<Response, GatewayError> {
        let uri = Uri::from_str(target).map_err(|e| GatewayError::Internal {
            message: format!("invalid target URI '{target}': {e}"),
        })?;

        let mut builder = Request::builder().method(ctx.method.clone()).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.outbound_headers(ctx);
        }
        let request = builder
            .body(Body::from(body.clone()))
            .map_err(|e| GatewayError::Internal {
                message: format!("failed to build outbound request: {e}"),
            })?;

        let deadline = self.descriptor.timeout();
        let response = match tokio::time::timeout(deadline, self.client.request(request)).await {
            // Deadline hit: the request future is dropped, a late response
            // is never delivered.
            Err(_) => {
                return Err(GatewayError::Timeout {
                    timeout_ms: self.descriptor.timeout_ms,
                })
            }
            Ok(Err(e)) => {
                return Err(GatewayError::Transport {
                    message: e.to_string(),
                })
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if status.is_server_error() {
            // Buffer the body so the final attempt can still forward it.
            let (parts, incoming) = response.into_parts();
            let bytes = axum::body::to_bytes(Body::new(incoming), MAX_UPSTREAM_ERROR_BODY)
                .await
                .unwrap_or_default();
            return Err(GatewayError::Upstream {
                status,
                headers: parts.headers,
                body: bytes,
            });
        }

        // Terminal: forward verbatim, 4xx included.
        let (parts, incoming) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(incoming)))
    }

    /// Map a final error to the client response per the error taxonomy.
    fn failure_response(&self, err: GatewayError, ctx: &ProxyRequestContext) -> Response {
        match err {
            // The backend did respond; forward its last word verbatim.
            GatewayError::Upstream {
                status,
                headers,
                body,
            } => {
                let mut builder = Response::builder().status(status);
                if let Some(out) = builder.headers_mut() {
                    *out = headers;
                }
                builder
                    .body(Body::from(body))
                    .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
            }
            GatewayError::CircuitOpen { ref service } => error_response(
                err.client_status(),
                err.code(),
                format!("Service '{service}' is unavailable: circuit breaker is open"),
                &ctx.correlation_id,
            ),
            GatewayError::Timeout { timeout_ms } => error_response(
                err.client_status(),
                err.code(),
                format!(
                    "Request to service '{}' timed out after {timeout_ms}ms",
                    self.descriptor.name
                ),
                &ctx.correlation_id,
            ),
            GatewayError::Transport { .. } => error_response(
                err.client_status(),
                err.code(),
                format!("Service '{}' is unavailable", self.descriptor.name),
                &ctx.correlation_id,
            ),
            // Never leak internals to the client.
            GatewayError::Internal { ref message } => {
                tracing::error!(
                    service = %self.descriptor.name,
                    correlation_id = %ctx.correlation_id,
                    message = %message,
                    "Internal proxy error"
                );
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Internal server error",
                    &ctx.correlation_id,
                )
            }
        }
    }

    /// Headers for the outbound request: the fixed passthrough set, any
    /// configured extras, and the x-forwarded family set by the gateway.
    fn outbound_headers(&self, ctx: &ProxyRequestContext) -> HeaderMap {
        let mut headers = HeaderMap::new();

        for name in PASSTHROUGH_HEADERS {
            if let Some(value) = ctx.headers.get(name) {
                if let Ok(parsed) = HeaderName::from_str(name) {
                    headers.insert(parsed, value.clone());
                }
            }
        }
        for name in &self.preserve {
            if let Some(value) = ctx.headers.get(name) {
                headers.insert(name.clone(), value.clone());
            }
        }

        if let Ok(value) = HeaderValue::from_str(&ctx.correlation_id) {
            headers.insert(CORRELATION_ID_HEADER, value);
        }
        // Always the gateway's own view of the client, never the inbound
        // header (spoofing guard).
        if let Ok(value) = HeaderValue::from_str(&ctx.client_ip.to_string()) {
            headers.insert("x-forwarded-for", value);
        }
        if let Some(host) = &ctx.host {
            if let Ok(value) = HeaderValue::from_str(host) {
                headers.insert("x-forwarded-host", value);
            }
        }
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
        if let Ok(value) = HeaderValue::from_str(&ctx.original_uri) {
            headers.insert("x-original-uri", value);
        }

        headers
    }

    /// Full target URL for this request.
    fn target_uri_string(&self, ctx: &ProxyRequestContext) -> String {
        let path = rewrite_path(&ctx.path);
        match &ctx.query {
            Some(query) => format!("{}{}?{}", self.base_url, path, query),
            None => format!("{}{}", self.base_url, path),
        }
    }
}

/// Strip the `/api/v{n}` routing prefix; the backend path starts at the
/// service-name segment (`/api/v1/users?page=1` → `/users?page=1`).
/// Paths that do not carry the prefix pass through unchanged.
fn rewrite_path(path: &str) -> String {
    let Some(rest) = path.strip_prefix("/api/") else {
        return path.to_string();
    };
    let Some((version, tail)) = rest.split_once('/') else {
        return path.to_string();
    };
    let is_version = version.len() >= 2
        && version.starts_with('v')
        && version[1..].bytes().all(|b| b.is_ascii_digit());
    if !is_version {
        return path.to_string();
    }
    format!("/{tail}")
}
