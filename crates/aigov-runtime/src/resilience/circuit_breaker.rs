//! Per-task circuit breaker.
//!
//! After repeated failures of one oracle task, calls for that task are
//! skipped until the recovery timeout passes. Skipped calls fail
//! immediately, so callers fall back without waiting on a dead oracle.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::duration_str;
use crate::oracle::OracleTask;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,

    /// Time before a trial call is let through, e.g. "30s"
    #[serde(with = "duration_str")]
    pub recovery_timeout: Duration,

    /// Trial successes needed to close again
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

#[derive(Debug, Clone)]
pub enum CircuitState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { successes: u32 },
}

/// One circuit per [`OracleTask`], so an outage seen by one task
/// does not block the others.
pub struct CircuitBreaker {
    states: RwLock<HashMap<OracleTask, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls for `task` should be skipped.
    ///
    /// An open circuit whose recovery timeout has passed moves to half-open
    /// and lets the call through.
    pub fn is_open(&self, task: OracleTask) -> bool {
        let mut states = self.states.write();
        let recovered = match states.get(&task) {
            Some(CircuitState::Open { opened_at }) => {
                opened_at.elapsed() >= self.config.recovery_timeout
            }
            _ => return false,
        };

        if recovered {
            states.insert(task, CircuitState::HalfOpen { successes: 0 });
            tracing::info!(task = %task, "Circuit half-open, trying oracle again");
        }
        !recovered
    }

    pub fn record_success(&self, task: OracleTask) {
        let mut states = self.states.write();
        match states.get(&task).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(task, CircuitState::Closed { failures: 0 });
                    tracing::info!(task = %task, "Circuit closed after recovery");
                } else {
                    states.insert(
                        task,
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { failures }) if failures > 0 => {
                states.insert(task, CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, task: OracleTask) {
        let mut states = self.states.write();
        let failures = match states.get(&task).cloned() {
            Some(CircuitState::Closed { failures }) => failures + 1,
            None => 1,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    task,
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(task = %task, "Circuit reopened after failed recovery");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures >= self.config.failure_threshold {
            states.insert(
                task,
                CircuitState::Open {
                    opened_at: Instant::now(),
                },
            );
            tracing::warn!(task = %task, failures, "Circuit opened after repeated failures");
        } else {
            states.insert(task, CircuitState::Closed { failures });
        }
    }

    pub fn state(&self, task: OracleTask) -> CircuitState {
        self.states
            .read()
            .get(&task)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Tasks whose circuit is currently open, for health reporting.
    pub fn open_tasks(&self) -> Vec<OracleTask> {
        let states = self.states.read();
        let mut open: Vec<_> = states
            .iter()
            .filter(|(_, state)| matches!(state, CircuitState::Open { .. }))
            .map(|(task, _)| *task)
            .collect();
        open.sort();
        open
    }

    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, recovery_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            recovery_timeout,
            success_threshold: 1,
        })
    }

    #[test]
    fn test_starts_closed() {
        let cb = CircuitBreaker::default();
        assert!(!cb.is_open(OracleTask::Summary));
        assert!(cb.open_tasks().is_empty());
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = breaker(2, Duration::from_secs(30));
        cb.record_failure(OracleTask::Vote);
        assert!(!cb.is_open(OracleTask::Vote));
        cb.record_failure(OracleTask::Vote);
        assert!(cb.is_open(OracleTask::Vote));
        assert_eq!(cb.open_tasks(), vec![OracleTask::Vote]);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(30));
        cb.record_failure(OracleTask::Category);
        cb.record_failure(OracleTask::Category);
        cb.record_success(OracleTask::Category);
        cb.record_failure(OracleTask::Category);
        cb.record_failure(OracleTask::Category);
        assert!(!cb.is_open(OracleTask::Category));
    }

    #[test]
    fn test_tasks_are_independent() {
        let cb = breaker(1, Duration::from_secs(30));
        cb.record_failure(OracleTask::RiskScore);
        assert!(cb.is_open(OracleTask::RiskScore));
        assert!(!cb.is_open(OracleTask::Summary));
    }

    #[test]
    fn test_recovery_after_timeout() {
        let cb = breaker(1, Duration::ZERO);
        cb.record_failure(OracleTask::Reasoning);

        // Zero timeout: the next check lets a trial call through
        assert!(!cb.is_open(OracleTask::Reasoning));
        assert!(matches!(
            cb.state(OracleTask::Reasoning),
            CircuitState::HalfOpen { successes: 0 }
        ));

        cb.record_success(OracleTask::Reasoning);
        assert!(matches!(
            cb.state(OracleTask::Reasoning),
            CircuitState::Closed { failures: 0 }
        ));
    }

    #[test]
    fn test_failed_trial_reopens() {
        let cb = breaker(1, Duration::ZERO);
        cb.record_failure(OracleTask::Confidence);
        assert!(!cb.is_open(OracleTask::Confidence));
        cb.record_failure(OracleTask::Confidence);
        assert!(matches!(
            cb.state(OracleTask::Confidence),
            CircuitState::Open { .. }
        ));
    }

    #[test]
    fn test_config_reads_humantime() {
        let config: CircuitBreakerConfig =
            serde_yaml::from_str("failure_threshold: 5\nrecovery_timeout: 2m\n").unwrap();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout, Duration::from_secs(120));
        assert_eq!(config.success_threshold, 1);
    }
}
