//! Token ceiling for provider-backed oracles.
//!
//! The ceiling covers the lifetime of the tracker. Once it is spent the
//! oracle refuses calls, and the analyzer and delegate fall back to their
//! fixed answers.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::providers::TokenUsage;

/// What the oracle has spent so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleUsage {
    pub calls: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// USD at list price
    pub cost_usd: f64,
}

impl OracleUsage {
    pub fn tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }

    fn charge(&mut self, usage: &TokenUsage, model: &str) {
        self.calls += 1;
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.cost_usd += list_price(usage, model);
    }
}

/// Per-million-token input and output prices by model family.
fn list_price(usage: &TokenUsage, model: &str) -> f64 {
    let (input, output) = if model.contains("opus") {
        (15.0, 75.0)
    } else if model.contains("haiku") {
        (1.0, 5.0)
    } else {
        (3.0, 15.0)
    };
    (f64::from(usage.prompt_tokens) * input + f64::from(usage.completion_tokens) * output)
        / 1_000_000.0
}

pub struct BudgetTracker {
    ceiling: u32,
    spent: Mutex<OracleUsage>,
}

impl BudgetTracker {
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling,
            spent: Mutex::new(OracleUsage::default()),
        }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    pub fn record_usage(&self, usage: &TokenUsage, model: &str) {
        let mut spent = self.spent.lock();
        spent.charge(usage, model);
        if spent.tokens() >= self.ceiling {
            tracing::warn!(
                ceiling = self.ceiling,
                spent = spent.tokens(),
                "Oracle token budget exhausted"
            );
        }
    }

    pub fn remaining(&self) -> u32 {
        self.ceiling.saturating_sub(self.used())
    }

    pub fn used(&self) -> u32 {
        self.spent.lock().tokens()
    }

    pub fn usage(&self) -> OracleUsage {
        self.spent.lock().clone()
    }

    pub fn reset(&self) {
        *self.spent.lock() = OracleUsage::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u32, completion: u32) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
        }
    }

    #[test]
    fn test_spending_lowers_remaining() {
        let tracker = BudgetTracker::new(1000);
        assert!(tracker.can_afford(1000));

        tracker.record_usage(&usage(500, 100), "claude-sonnet-4-5");
        assert_eq!(tracker.remaining(), 400);
        assert!(!tracker.can_afford(401));

        tracker.record_usage(&usage(500, 100), "claude-sonnet-4-5");
        assert_eq!(tracker.remaining(), 0);
        assert_eq!(tracker.used(), 1200);
    }

    #[test]
    fn test_usage_accumulates_across_calls() {
        let tracker = BudgetTracker::new(10_000);
        tracker.record_usage(&usage(1000, 100), "claude-sonnet-4-5");
        tracker.record_usage(&usage(500, 50), "claude-sonnet-4-5");

        let spent = tracker.usage();
        assert_eq!(spent.calls, 2);
        assert_eq!(spent.tokens(), 1650);
        assert!(spent.cost_usd > 0.0);
    }

    #[test]
    fn test_price_follows_model_family() {
        let million_in = usage(1_000_000, 0);
        assert!((list_price(&million_in, "claude-sonnet-4-5") - 3.0).abs() < 1e-9);
        let sonnet = list_price(&million_in, "claude-sonnet-4-5");
        assert!(list_price(&million_in, "claude-haiku-4-5") < sonnet);
        assert!(list_price(&million_in, "claude-opus-4-1") > sonnet);
    }

    #[test]
    fn test_reset_restores_the_ceiling() {
        let tracker = BudgetTracker::new(100);
        tracker.record_usage(&usage(100, 0), "m");
        assert!(!tracker.can_afford(1));

        tracker.reset();
        assert!(tracker.can_afford(100));
        assert_eq!(tracker.usage(), OracleUsage::default());
    }
}
