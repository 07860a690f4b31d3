//! Gateway error taxonomy.
//!
//! Every failure mode a proxied call can hit is one of a closed set of
//! variants, so call sites match exhaustively instead of inspecting
//! message strings. Upstream error responses are carried whole so they
//! can be forwarded to the client verbatim.

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use chrono::Utc;
use serde::Serialize;

/// Failure modes of a proxied call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The circuit breaker rejected the call before any network attempt.
    #[error("circuit breaker is open for service '{service}'")]
    CircuitOpen { service: String },

    /// The call did not complete within its deadline.
    #[error("upstream call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connect/DNS/reset failure; no HTTP response was received.
    #[error("upstream transport failure: {message}")]
    Transport { message: String },

    /// The backend responded with a server error status. The response is
    /// retained so the final attempt can be forwarded verbatim.
    #[error("upstream responded with status {status}")]
    Upstream {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },

    /// Unexpected failure inside the gateway itself.
    #[error("internal gateway error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Whether another attempt may be made for this failure.
    ///
    /// Only transport failures, timeouts and 5xx responses are retryable;
    /// a circuit-open rejection bypasses retry entirely.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Transport { .. } | GatewayError::Timeout { .. } => true,
            GatewayError::Upstream { status, .. } => status.is_server_error(),
            GatewayError::CircuitOpen { .. } | GatewayError::Internal { .. } => false,
        }
    }

    /// Status returned to the client when this error is synthesized.
    pub fn client_status(&self) -> StatusCode {
        match self {
            GatewayError::CircuitOpen { .. } | GatewayError::Transport { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Upstream { status, .. } => *status,
            GatewayError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for synthesized error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::CircuitOpen { .. } | GatewayError::Transport { .. } => {
                "SERVICE_UNAVAILABLE"
            }
            GatewayError::Timeout { .. } => "GATEWAY_TIMEOUT",
            GatewayError::Upstream { .. } => "UPSTREAM_ERROR",
            GatewayError::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// JSON body for errors synthesized by the gateway.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    pub correlation_id: String,
    /// RFC-3339 timestamp of when the error was produced.
    pub timestamp: String,
}

/// Build a client-facing JSON error response carrying the correlation id.
pub fn error_response(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    correlation_id: &str,
) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code,
            message: message.into(),
            correlation_id: correlation_id.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        },
    };
    let json = serde_json::to_vec(&body).unwrap_or_default();

    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .header("x-correlation-id", correlation_id)
        .body(Body::from(json))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_follows_taxonomy() {
        assert!(GatewayError::Transport {
            message: "connection refused".into()
        }
        .is_retryable());
        assert!(GatewayError::Timeout { timeout_ms: 100 }.is_retryable());
        assert!(GatewayError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
        .is_retryable());
        assert!(!GatewayError::CircuitOpen {
            service: "users".into()
        }
        .is_retryable());
        assert!(!GatewayError::Internal {
            message: "boom".into()
        }
        .is_retryable());
    }

    #[test]
    fn client_mapping_matches_error_table() {
        let open = GatewayError::CircuitOpen {
            service: "users".into(),
        };
        assert_eq!(open.client_status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(open.code(), "SERVICE_UNAVAILABLE");

        let timeout = GatewayError::Timeout { timeout_ms: 100 };
        assert_eq!(timeout.client_status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.code(), "GATEWAY_TIMEOUT");

        let internal = GatewayError::Internal {
            message: "boom".into(),
        };
        assert_eq!(internal.client_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
