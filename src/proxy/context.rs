//! Per-request proxy context.
//!
//! The correlation id is threaded explicitly through the call chain as a
//! field of this context; nothing reads it from ambient request-local
//! storage.

use std::net::IpAddr;

use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use uuid::Uuid;

/// Header carrying the correlation id end to end.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Everything the proxy needs from one inbound request, derived once and
/// alive only for the duration of the proxied call.
#[derive(Debug, Clone)]
pub struct ProxyRequestContext {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    /// Inbound correlation id, or a freshly generated UUID v4.
    pub correlation_id: String,
    /// The gateway's own view of the client address; never taken from an
    /// inbound header, so it cannot be spoofed.
    pub client_ip: IpAddr,
    /// Inbound Host header, forwarded as x-forwarded-host.
    pub host: Option<String>,
    /// Full inbound URI, forwarded as x-original-uri.
    pub original_uri: String,
}

impl ProxyRequestContext {
    pub fn new(parts: &Parts, client_ip: IpAddr) -> Self {
        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let host = parts
            .headers
            .get(axum::http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(ToString::to_string),
            headers: parts.headers.clone(),
            correlation_id,
            client_ip,
            host,
            original_uri: parts.uri.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn parts(req: Request<Body>) -> Parts {
        req.into_parts().0
    }

    #[test]
    fn inbound_correlation_id_is_kept() {
        let req = Request::builder()
            .uri("/api/v1/users?page=1")
            .header("x-correlation-id", "abc-123")
            .header("host", "gateway.local")
            .body(Body::empty())
            .unwrap();
        let ctx = ProxyRequestContext::new(&parts(req), "10.0.0.9".parse().unwrap());

        assert_eq!(ctx.correlation_id, "abc-123");
        assert_eq!(ctx.path, "/api/v1/users");
        assert_eq!(ctx.query.as_deref(), Some("page=1"));
        assert_eq!(ctx.host.as_deref(), Some("gateway.local"));
        assert_eq!(ctx.original_uri, "/api/v1/users?page=1");
    }

    #[test]
    fn missing_correlation_id_is_generated() {
        let req = Request::builder()
            .uri("/api/v1/users")
            .body(Body::empty())
            .unwrap();
        let ctx = ProxyRequestContext::new(&parts(req), "10.0.0.9".parse().unwrap());

        assert!(Uuid::parse_str(&ctx.correlation_id).is_ok());
    }
}
