//! Resilience for model and lookup calls.
//!
//! - Circuit breakers keyed by stage or knowledge source
//! - Token budgets enforced by a metering provider wrapper

mod budget;
mod circuit_breaker;

pub use budget::{BudgetTracker, LlmUsage, MeteredProvider, TokenBudget};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
