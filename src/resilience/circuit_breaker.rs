//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: backend assumed down, calls fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: reset timeout elapsed, on next call
//! Half-Open → Closed: probe call succeeds (failure count zeroed)
//! Half-Open → Open: probe call fails
//! ```
//!
//! # Design Decisions
//! - Per-service circuit breaker (not global)
//! - Fail fast in Open state: the wrapped call is never invoked
//! - Single probe in Half-Open (prevents hammering a recovering backend)
//! - State guarded by a mutex that is never held across an await

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::GatewayError;
use crate::observability::metrics;

/// Breaker state, as exposed to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Tuning for one breaker, taken from the service descriptor.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Cooldown before an open circuit allows a probe.
    pub reset_timeout: Duration,

    /// Optional deadline for the whole wrapped call. When it expires the
    /// call's future is dropped, so a late result is discarded.
    pub call_timeout: Option<Duration>,
}

/// Immutable view of a breaker, safe to serialize for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerSnapshot {
    pub service: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
    /// Monotonic deadline used for the Open → Half-Open decision.
    next_attempt_at: Option<Instant>,
    /// Wall-clock mirror of `next_attempt_at`, for snapshots only.
    next_attempt_wall: Option<DateTime<Utc>>,
    /// When the current Half-Open probe was admitted.
    half_open_since: Option<Instant>,
}

/// State machine gating calls to one backend service.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
                next_attempt_at: None,
                next_attempt_wall: None,
                half_open_since: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one wrapped call through the breaker.
    ///
    /// Fails fast with [`GatewayError::CircuitOpen`] while the circuit is
    /// open and the cooldown has not elapsed; in that case `call` is never
    /// invoked. Any error returned by `call` (or a timeout, if configured)
    /// counts as a single breaker failure.
    pub async fn execute<F, Fut, T>(
        &self,
        correlation_id: &str,
        call: F,
    ) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.admit(correlation_id)?;

        let result = match self.config.call_timeout {
            Some(deadline) => match tokio::time::timeout(deadline, call()).await {
                Ok(result) => result,
                // The timed-out future is dropped here; its late result,
                // if any, can never be delivered.
                Err(_) => Err(GatewayError::Timeout {
                    timeout_ms: deadline.as_millis() as u64,
                }),
            },
            None => call().await,
        };

        match result {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure(correlation_id);
                Err(err)
            }
        }
    }

    /// Decide whether a call may proceed, applying the Open → Half-Open
    /// transition when the cooldown has elapsed.
    fn admit(&self, correlation_id: &str) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let due = inner.next_attempt_at.is_some_and(|at| now >= at);
                if !due {
                    return Err(GatewayError::CircuitOpen {
                        service: self.name.clone(),
                    });
                }
                self.transition(&mut inner, CircuitState::HalfOpen, correlation_id);
                inner.half_open_since = Some(now);
                Ok(())
            }
            CircuitState::HalfOpen => {
                // One probe at a time. If a probe was admitted and then
                // abandoned (caller dropped), allow a new one after a full
                // cooldown so the breaker cannot wedge.
                let stale = inner
                    .half_open_since
                    .is_some_and(|since| now >= since + self.config.reset_timeout);
                if stale {
                    inner.half_open_since = Some(now);
                    return Ok(());
                }
                Err(GatewayError::CircuitOpen {
                    service: self.name.clone(),
                })
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.success_count = inner.success_count.saturating_add(1);

        if inner.state == CircuitState::HalfOpen {
            inner.failure_count = 0;
            inner.next_attempt_at = None;
            inner.next_attempt_wall = None;
            inner.half_open_since = None;
            self.transition(&mut inner, CircuitState::Closed, "probe");
        }
    }

    fn on_failure(&self, correlation_id: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(Utc::now());

        let should_open = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failure_count >= self.config.failure_threshold,
            CircuitState::Open => false,
        };

        if should_open {
            inner.next_attempt_at = Some(Instant::now() + self.config.reset_timeout);
            inner.next_attempt_wall = Some(
                Utc::now()
                    + chrono::Duration::from_std(self.config.reset_timeout)
                        .unwrap_or_else(|_| chrono::Duration::zero()),
            );
            inner.half_open_since = None;
            self.transition(&mut inner, CircuitState::Open, correlation_id);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState, correlation_id: &str) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        metrics::record_circuit_state(&self.name, to);
        match to {
            CircuitState::Open => tracing::warn!(
                service = %self.name,
                from = ?from,
                failure_count = inner.failure_count,
                correlation_id = %correlation_id,
                "Circuit opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                service = %self.name,
                correlation_id = %correlation_id,
                "Circuit half-open, admitting probe"
            ),
            CircuitState::Closed => tracing::info!(
                service = %self.name,
                "Circuit closed"
            ),
        }
    }

    /// Immutable snapshot of the current state. Reading never mutates.
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        CircuitBreakerSnapshot {
            service: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_at: inner.last_failure_at,
            next_attempt_at: inner.next_attempt_wall,
        }
    }

    /// Force the breaker closed and zero all counters. Operator action,
    /// not part of normal traffic flow.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure_at = None;
        inner.next_attempt_at = None;
        inner.next_attempt_wall = None;
        inner.half_open_since = None;
        self.transition(&mut inner, CircuitState::Closed, "operator-reset");
        tracing::info!(service = %self.name, "Circuit breaker reset by operator");
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
