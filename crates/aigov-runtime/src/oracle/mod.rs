//! The text oracle behind proposal analysis and delegate recommendation.
//!
//! An oracle maps a prompt to free text. It is slow and fallible, and its
//! replies are not trusted: every reply is coerced by `aigov_core::parsing`
//! before it becomes a typed value.
//!
//! Callers never hold a bare oracle. They go through [`GuardedOracle`],
//! which keys a circuit breaker by [`OracleTask`] and bounds every call
//! with a timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::providers::ProviderError;
use crate::resilience::CircuitBreaker;

mod provider;
mod scripted;

pub use provider::ProviderOracle;
pub use scripted::{FailingOracle, ScriptedOracle};

/// Failures of a single oracle call.
///
/// None of these reach a service caller: the analyzer and recommender
/// convert every one into their fixed fallback.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Oracle timed out after {0:?}")]
    Timeout(Duration),

    #[error("Circuit open for {0}")]
    CircuitOpen(OracleTask),

    #[error("Token budget exhausted: need {needed}, {remaining} remaining")]
    BudgetExceeded { needed: u32, remaining: u32 },

    #[error("Oracle returned an empty reply")]
    EmptyReply,

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

/// The individual questions put to the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleTask {
    Summary,
    RiskScore,
    Category,
    Explanation,
    Vote,
    Confidence,
    Reasoning,
}

impl OracleTask {
    pub const ALL: [OracleTask; 7] = [
        OracleTask::Summary,
        OracleTask::RiskScore,
        OracleTask::Category,
        OracleTask::Explanation,
        OracleTask::Vote,
        OracleTask::Confidence,
        OracleTask::Reasoning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OracleTask::Summary => "summary",
            OracleTask::RiskScore => "risk_score",
            OracleTask::Category => "category",
            OracleTask::Explanation => "explanation",
            OracleTask::Vote => "vote",
            OracleTask::Confidence => "confidence",
            OracleTask::Reasoning => "reasoning",
        }
    }
}

impl fmt::Display for OracleTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prompt-to-text capability.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError>;

    /// Name for logs.
    fn name(&self) -> &str;
}

/// An oracle behind a per-task circuit breaker and a call timeout.
pub struct GuardedOracle {
    inner: Arc<dyn Oracle>,
    breaker: Arc<CircuitBreaker>,
    timeout: Duration,
}

impl GuardedOracle {
    pub fn new(inner: Arc<dyn Oracle>, breaker: Arc<CircuitBreaker>, timeout: Duration) -> Self {
        Self {
            inner,
            breaker,
            timeout,
        }
    }

    /// Default breaker settings and a 15s timeout.
    pub fn with_defaults(inner: Arc<dyn Oracle>) -> Self {
        Self::new(
            inner,
            Arc::new(CircuitBreaker::default()),
            Duration::from_secs(15),
        )
    }

    /// Ask one question. Blank replies count as failures.
    pub async fn ask(&self, task: OracleTask, prompt: &str) -> Result<String, OracleError> {
        if self.breaker.is_open(task) {
            tracing::debug!(
                task = %task,
                oracle = self.inner.name(),
                "Circuit open, skipping oracle"
            );
            return Err(OracleError::CircuitOpen(task));
        }

        tracing::debug!(task = %task, prompt_chars = prompt.len(), "Oracle request");

        let result = match tokio::time::timeout(self.timeout, self.inner.complete(prompt)).await {
            Ok(Ok(reply)) if reply.trim().is_empty() => Err(OracleError::EmptyReply),
            Ok(reply) => reply,
            Err(_) => Err(OracleError::Timeout(self.timeout)),
        };

        match &result {
            Ok(_) => self.breaker.record_success(task),
            Err(e) => {
                self.breaker.record_failure(task);
                tracing::warn!(
                    task = %task,
                    oracle = self.inner.name(),
                    error = %e,
                    "Oracle call failed"
                );
            }
        }

        result
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }
}

impl fmt::Debug for GuardedOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedOracle")
            .field("oracle", &self.inner.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
