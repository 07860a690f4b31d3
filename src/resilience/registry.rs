//! Per-service circuit breaker registry.
//!
//! # Responsibilities
//! - Hand out the single breaker instance for a service name
//! - Create breakers lazily, at most once per name
//! - Expose snapshots and operator resets for the diagnostic surface
//!
//! # Design Decisions
//! - Explicitly constructed and passed by reference; no ambient global
//! - Breaker identity matters: stats accumulate for the process lifetime

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::resilience::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot,
};

/// Owns one [`CircuitBreaker`] per service name.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
        }
    }

    /// Return the breaker for `name`, creating it on first lookup.
    ///
    /// Subsequent calls return the same instance regardless of the config
    /// passed; the first caller's config wins.
    pub fn get_or_create(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, config)))
            .clone()
    }

    /// Breaker for `name`, if one has been created.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.clone())
    }

    /// Snapshot every breaker, keyed by service name.
    pub fn all_snapshots(&self) -> HashMap<String, CircuitBreakerSnapshot> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect()
    }

    /// Reset a single breaker. Returns false for unknown names.
    pub fn reset(&self, name: &str) -> bool {
        match self.breakers.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Reset every breaker.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}
