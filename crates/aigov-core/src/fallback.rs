//! Fixed results used when the oracle cannot produce one.
//!
//! Proposal creation and vote casting never block on oracle availability.
//! When analysis or recommendation fails, these exact values are returned
//! instead. They are constants, not oracle output.

use crate::types::{Category, Confidence, ProposalAttributes, RiskScore, Vote, VoteRecommendation};

pub const FALLBACK_SUMMARY: &str = "Failed to generate summary.";

/// Neutral risk score for unanalyzed proposals.
pub const FALLBACK_RISK_SCORE: u8 = 5;

pub const FALLBACK_CATEGORY: Category = Category::Other;

pub const FALLBACK_EXPLANATION: &str = "AI analysis failed. Please review the proposal manually.";

pub const FALLBACK_REASONING: &str = "AI analysis failed. Please vote manually.";

impl ProposalAttributes {
    /// The attribute set returned when analysis fails.
    pub fn fallback() -> Self {
        Self {
            summary: FALLBACK_SUMMARY.to_string(),
            risk_score: RiskScore::new(i64::from(FALLBACK_RISK_SCORE))
                .unwrap_or_else(|_| unreachable!("fallback risk score is in range")),
            category: FALLBACK_CATEGORY,
            explanation: FALLBACK_EXPLANATION.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}

impl VoteRecommendation {
    /// The recommendation returned when the delegate cannot decide.
    ///
    /// Its vote is `Abstain`: callers must treat it as "no recommendation"
    /// and never submit it as a ballot.
    pub fn fallback() -> Self {
        Self {
            vote: Vote::Abstain,
            confidence: Confidence::new(0)
                .unwrap_or_else(|_| unreachable!("zero confidence is in range")),
            reasoning: FALLBACK_REASONING.to_string(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.vote == Vote::Abstain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_fallback_is_exact() {
        let fallback = ProposalAttributes::fallback();
        assert_eq!(fallback.summary, "Failed to generate summary.");
        assert_eq!(fallback.risk_score.get(), 5);
        assert_eq!(fallback.category, Category::Other);
        assert_eq!(
            fallback.explanation,
            "AI analysis failed. Please review the proposal manually."
        );
        assert!(fallback.is_fallback());
    }

    #[test]
    fn test_recommendation_fallback_is_exact() {
        let fallback = VoteRecommendation::fallback();
        assert_eq!(fallback.vote, Vote::Abstain);
        assert_eq!(fallback.confidence.get(), 0);
        assert_eq!(fallback.reasoning, "AI analysis failed. Please vote manually.");
        assert!(fallback.is_fallback());
        assert_eq!(fallback.vote.as_ballot(), None);
    }
}
