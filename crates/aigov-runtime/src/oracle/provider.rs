//! Oracle backed by an LLM provider.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Oracle, OracleError};
use crate::prompts::SYSTEM_PROMPT;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider};
use crate::resilience::BudgetTracker;

/// Adapts an [`LlmProvider`] into an [`Oracle`].
///
/// Each prompt is sent as one user turn after a fixed system message.
/// The token budget is checked before the call and charged after it.
pub struct ProviderOracle {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
    budget: Arc<BudgetTracker>,
}

impl ProviderOracle {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: CompletionConfig,
        budget: Arc<BudgetTracker>,
    ) -> Self {
        Self {
            provider,
            config,
            budget,
        }
    }

    pub fn budget(&self) -> &BudgetTracker {
        &self.budget
    }
}

#[async_trait]
impl Oracle for ProviderOracle {
    async fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        let needed = self.provider.estimate_tokens(SYSTEM_PROMPT)
            + self.provider.estimate_tokens(prompt)
            + self.config.max_tokens;

        if !self.budget.can_afford(needed) {
            return Err(OracleError::BudgetExceeded {
                needed,
                remaining: self.budget.remaining(),
            });
        }

        let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
        let response = self.provider.complete(messages, &self.config).await?;

        self.budget.record_usage(&response.usage, &response.model);
        tracing::debug!(
            provider = self.provider.name(),
            model = %response.model,
            tokens = response.usage.total(),
            "Oracle completion"
        );

        Ok(response.content)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}
