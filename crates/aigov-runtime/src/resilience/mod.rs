//! Protection against a slow or failing oracle.
//!
//! - Circuit breaker per oracle task
//! - Token budget with usage accounting
//!
//! Nothing here retries. A failed or skipped call goes straight to the
//! caller's fixed fallback.

mod budget;
mod circuit_breaker;

pub use budget::{BudgetTracker, OracleUsage};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
