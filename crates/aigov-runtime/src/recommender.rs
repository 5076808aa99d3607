//! Delegate vote recommendation.
//!
//! Three oracle questions, strictly in order: the vote, then the
//! confidence in that vote, then the reasoning for that vote at that
//! confidence. Each later prompt carries the earlier answers, so the steps
//! cannot run concurrently.

use std::sync::Arc;

use aigov_core::{
    parse_confidence, parse_vote, PreferenceProfile, ProposalAttributes, VoteRecommendation,
};

use crate::analyzer::{ask, AnalysisError};
use crate::oracle::{GuardedOracle, OracleTask};
use crate::prompts;

pub struct DelegateRecommender {
    oracle: Arc<GuardedOracle>,
}

impl DelegateRecommender {
    pub fn new(oracle: Arc<GuardedOracle>) -> Self {
        Self { oracle }
    }

    /// Recommend a vote, or the Abstain fallback when the oracle cannot
    /// produce a complete recommendation.
    pub async fn recommend(
        &self,
        attributes: &ProposalAttributes,
        profile: &PreferenceProfile,
        proposal_text: &str,
    ) -> VoteRecommendation {
        if let Err(e) = profile.validate() {
            tracing::warn!(error = %e, "Invalid preference profile, no recommendation");
            return VoteRecommendation::fallback();
        }

        match self.try_recommend(attributes, profile, proposal_text).await {
            Ok(recommendation) => recommendation,
            Err(e) => {
                tracing::warn!(
                    task = %e.task(),
                    oracle = self.oracle.name(),
                    error = %e,
                    "Delegate recommendation failed, using fallback"
                );
                VoteRecommendation::fallback()
            }
        }
    }

    /// Recommend without the fallback.
    pub async fn try_recommend(
        &self,
        attributes: &ProposalAttributes,
        profile: &PreferenceProfile,
        proposal_text: &str,
    ) -> Result<VoteRecommendation, AnalysisError> {
        let vote_prompt = prompts::vote_prompt(proposal_text, attributes, profile);
        let vote_reply = ask(&self.oracle, OracleTask::Vote, &vote_prompt).await?;
        let vote = parse_vote(&vote_reply).map_err(|source| AnalysisError::Parse {
            task: OracleTask::Vote,
            source,
        })?;

        let confidence_prompt =
            prompts::confidence_prompt(proposal_text, attributes, profile, vote);
        let confidence_reply =
            ask(&self.oracle, OracleTask::Confidence, &confidence_prompt).await?;
        let confidence = parse_confidence(&confidence_reply).map_err(|source| AnalysisError::Parse {
            task: OracleTask::Confidence,
            source,
        })?;

        let reasoning_prompt =
            prompts::reasoning_prompt(proposal_text, attributes, profile, vote, confidence);
        let reasoning = ask(&self.oracle, OracleTask::Reasoning, &reasoning_prompt).await?;

        tracing::debug!(vote = %vote, confidence = confidence.get(), "Delegate recommendation");

        Ok(VoteRecommendation {
            vote,
            confidence,
            reasoning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ScriptedOracle;
    use aigov_core::{Category, RiskScore, Vote};

    fn attributes() -> ProposalAttributes {
        ProposalAttributes {
            summary: "Invest 40% of the treasury in a new token.".to_string(),
            risk_score: RiskScore::new(9).unwrap(),
            category: Category::Finance,
            explanation: "Large, hard to unwind treasury exposure.".to_string(),
        }
    }

    fn conservative() -> PreferenceProfile {
        PreferenceProfile::new(2, 5, 3, 3, "conservative", None).unwrap()
    }

    fn recommender(oracle: Arc<ScriptedOracle>) -> DelegateRecommender {
        DelegateRecommender::new(Arc::new(GuardedOracle::with_defaults(oracle)))
    }

    #[tokio::test]
    async fn test_steps_run_in_order_and_feed_forward() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .on_task(OracleTask::Vote, "Against")
                .on_task(OracleTask::Confidence, "85%")
                .on_task(OracleTask::Reasoning, "Too risky for a conservative treasury."),
        );

        let recommendation = recommender(oracle.clone())
            .recommend(&attributes(), &conservative(), "Invest treasury funds")
            .await;

        assert_eq!(recommendation.vote, Vote::Against);
        assert_eq!(recommendation.confidence.get(), 85);
        assert_eq!(recommendation.reasoning, "Too risky for a conservative treasury.");

        assert_eq!(
            oracle.tasks_seen(),
            vec![OracleTask::Vote, OracleTask::Confidence, OracleTask::Reasoning]
        );
        let prompts = oracle.prompts();
        assert!(prompts[1].ends_with("Vote: Against"));
        assert!(prompts[2].contains("voting 'Against' on this proposal with 85% confidence"));
    }

    #[tokio::test]
    async fn test_oversized_custom_rules_skip_the_oracle() {
        let oracle = Arc::new(ScriptedOracle::demo());
        let mut profile = conservative();
        profile.custom_rules = Some("x".repeat(aigov_core::MAX_CUSTOM_RULES_LEN + 1));

        let recommendation = recommender(oracle.clone())
            .recommend(&attributes(), &profile, "Invest treasury funds")
            .await;

        assert_eq!(recommendation, VoteRecommendation::fallback());
        assert!(oracle.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_abstain_reply_is_a_failure() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .on_task(OracleTask::Vote, "Abstain")
                .otherwise("50"),
        );
        let recommendation = recommender(oracle.clone())
            .recommend(&attributes(), &conservative(), "p")
            .await;

        assert_eq!(recommendation, VoteRecommendation::fallback());
        assert_eq!(oracle.tasks_seen(), vec![OracleTask::Vote]);
    }

    #[tokio::test]
    async fn test_fractional_confidence_falls_back() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .on_task(OracleTask::Vote, "For")
                .on_task(OracleTask::Confidence, "85.5%")
                .otherwise("unused"),
        );
        let recommendation = recommender(oracle.clone())
            .recommend(&attributes(), &conservative(), "p")
            .await;

        assert!(recommendation.is_fallback());
        assert!(!oracle.tasks_seen().contains(&OracleTask::Reasoning));
    }

    #[tokio::test]
    async fn test_reasoning_failure_discards_earlier_steps() {
        let oracle = Arc::new(
            ScriptedOracle::new()
                .on_task(OracleTask::Vote, "For")
                .on_task(OracleTask::Confidence, "90")
                .fail_task(OracleTask::Reasoning, "timeout"),
        );
        let recommendation = recommender(oracle)
            .recommend(&attributes(), &conservative(), "p")
            .await;

        assert_eq!(recommendation.vote, Vote::Abstain);
        assert_eq!(recommendation.confidence.get(), 0);
        assert_eq!(recommendation.reasoning, "AI analysis failed. Please vote manually.");
    }
}
