//! Circuit breaker to stop hammering a failing collaborator.
//!
//! The orchestrator keeps one circuit per [`Stage`](auditor_core::Stage):
//! while a stage's circuit is open, runs fail fast instead of waiting out
//! another timeout. The critic keeps one per knowledge source and skips
//! lookups while it is open, degrading straight to a best-effort critique.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::config::duration_str;

/// Circuit breaker configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before opening circuit
    pub failure_threshold: u32,

    /// Time before attempting recovery
    #[serde(with = "duration_str")]
    pub recovery_timeout: Duration,

    /// Successes needed to close circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 1,
        }
    }
}

/// State of a circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Calls are rejected until the recovery timeout passes
    Open { opened_at: Instant },

    /// Trial calls allowed
    HalfOpen { successes: u32 },
}

/// Independent circuits keyed by `K`.
pub struct CircuitBreaker<K> {
    states: RwLock<HashMap<K, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl<K> CircuitBreaker<K>
where
    K: Hash + Eq + Clone + Debug,
{
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls for `key` should be rejected right now.
    pub fn is_open(&self, key: &K) -> bool {
        let states = self.states.read();
        match states.get(key) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(key);
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn record_success(&self, key: &K) {
        let mut states = self.states.write();
        match states.get(key).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(key.clone(), CircuitState::Closed { failures: 0 });
                    tracing::info!(key = ?key, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        key.clone(),
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { .. }) => {
                states.insert(key.clone(), CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, key: &K) {
        let mut states = self.states.write();
        let failures = match states.get(key).cloned() {
            Some(CircuitState::Closed { failures }) => failures + 1,
            None => 1,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    key.clone(),
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(key = ?key, "Circuit reopened after failed recovery attempt");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures >= self.config.failure_threshold {
            states.insert(
                key.clone(),
                CircuitState::Open {
                    opened_at: Instant::now(),
                },
            );
            tracing::warn!(key = ?key, failures, "Circuit opened after repeated failures");
        } else {
            states.insert(key.clone(), CircuitState::Closed { failures });
        }
    }

    fn transition_to_half_open(&self, key: &K) {
        let mut states = self.states.write();
        if matches!(states.get(key), Some(CircuitState::Open { .. })) {
            states.insert(key.clone(), CircuitState::HalfOpen { successes: 0 });
            tracing::info!(key = ?key, "Circuit half-open, allowing trial call");
        }
    }

    pub fn state(&self, key: &K) -> CircuitState {
        self.states
            .read()
            .get(key)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Reset all circuits to closed.
    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl<K> Default for CircuitBreaker<K>
where
    K: Hash + Eq + Clone + Debug,
{
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
