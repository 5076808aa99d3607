//! Agreement tracking between AI recommendations and members' own votes.
//!
//! An entry is created when a delegate vote is cast. Its `matched` flag
//! stays `None` until the member's own choice is known; "unknown" and
//! "disagreed" are different states and are counted separately.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{normalize_address, DelegateHistoryEntry, ProposalId, VoteRecommendation};
use crate::ValidationError;

/// Create a history entry for a recommendation.
///
/// `matched` is `Some(ai == user)` when `actual_user_vote` is known and
/// `None` otherwise. An `Abstain` recommendation has no ballot to compare
/// and is rejected.
pub fn record_and_match(
    address: &str,
    proposal_id: ProposalId,
    recommendation: &VoteRecommendation,
    actual_user_vote: Option<bool>,
) -> Result<DelegateHistoryEntry, ValidationError> {
    let ai_recommendation = recommendation
        .vote
        .as_ballot()
        .ok_or(ValidationError::NoRecommendation)?;

    Ok(DelegateHistoryEntry {
        address: normalize_address(address),
        proposal_id,
        user_vote: actual_user_vote,
        ai_recommendation,
        matched: actual_user_vote.map(|user| user == ai_recommendation),
        created_at: Utc::now(),
    })
}

impl DelegateHistoryEntry {
    /// Record the member's own choice and finalize the match flag.
    ///
    /// Re-recording the same choice is a no-op; recording a different one
    /// is rejected.
    pub fn finalize(&mut self, user_vote: bool) -> Result<(), ValidationError> {
        match self.user_vote {
            Some(existing) if existing != user_vote => Err(ValidationError::ConflictingUserVote {
                proposal_id: self.proposal_id,
                address: self.address.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                self.user_vote = Some(user_vote);
                self.matched = Some(user_vote == self.ai_recommendation);
                tracing::debug!(
                    proposal_id = self.proposal_id,
                    address = %self.address,
                    matched = user_vote == self.ai_recommendation,
                    "Delegate history finalized"
                );
                Ok(())
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.matched.is_none()
    }
}

/// Aggregate agreement between a member and their AI delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgreementStats {
    /// All history entries
    pub total: usize,

    /// Entries whose match is known
    pub decided: usize,

    pub matched: usize,
    pub mismatched: usize,

    /// Entries still waiting for the member's own choice
    pub pending: usize,

    /// round(matched / decided * 100), `None` when nothing is decided
    pub match_rate: Option<u8>,
}

impl AgreementStats {
    pub fn from_entries(entries: &[DelegateHistoryEntry]) -> Self {
        let matched = entries.iter().filter(|e| e.matched == Some(true)).count();
        let mismatched = entries.iter().filter(|e| e.matched == Some(false)).count();
        let decided = matched + mismatched;

        let match_rate = if decided == 0 {
            None
        } else {
            Some(((matched as f64 / decided as f64) * 100.0).round() as u8)
        };

        Self {
            total: entries.len(),
            decided,
            matched,
            mismatched,
            pending: entries.len() - decided,
            match_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, Vote};

    fn recommendation(vote: Vote) -> VoteRecommendation {
        VoteRecommendation {
            vote,
            confidence: Confidence::new(80).unwrap(),
            reasoning: "Matches stated priorities".to_string(),
        }
    }

    #[test]
    fn test_absent_user_vote_is_pending_not_false() {
        let entry = record_and_match("0xAbC", 7, &recommendation(Vote::For), None).unwrap();
        assert_eq!(entry.matched, None);
        assert_ne!(entry.matched, Some(false));
        assert!(entry.is_pending());
        assert_eq!(entry.address, "0xabc");
    }

    #[test]
    fn test_match_is_equality() {
        let against = recommendation(Vote::Against);
        let agree = record_and_match("0x1", 1, &against, Some(false)).unwrap();
        assert_eq!(agree.matched, Some(true));

        let disagree = record_and_match("0x1", 2, &against, Some(true)).unwrap();
        assert_eq!(disagree.matched, Some(false));
    }

    #[test]
    fn test_abstain_has_nothing_to_match() {
        let result = record_and_match("0x1", 1, &VoteRecommendation::fallback(), Some(true));
        assert_eq!(result, Err(ValidationError::NoRecommendation));
    }

    #[test]
    fn test_finalize_sets_match_once() {
        let mut entry = record_and_match("0x1", 1, &recommendation(Vote::For), None).unwrap();
        entry.finalize(false).unwrap();
        assert_eq!(entry.user_vote, Some(false));
        assert_eq!(entry.matched, Some(false));

        // Same choice again is fine, a different one is not
        assert!(entry.finalize(false).is_ok());
        assert!(matches!(
            entry.finalize(true),
            Err(ValidationError::ConflictingUserVote { .. })
        ));
        assert_eq!(entry.matched, Some(false));
    }

    #[test]
    fn test_stats_exclude_pending_from_rate() {
        let entries = vec![
            record_and_match("0x1", 1, &recommendation(Vote::For), Some(true)).unwrap(),
            record_and_match("0x1", 2, &recommendation(Vote::For), Some(true)).unwrap(),
            record_and_match("0x1", 3, &recommendation(Vote::For), Some(false)).unwrap(),
            record_and_match("0x1", 4, &recommendation(Vote::For), None).unwrap(),
        ];
        let stats = AgreementStats::from_entries(&entries);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.decided, 3);
        assert_eq!(stats.matched, 2);
        assert_eq!(stats.mismatched, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.match_rate, Some(67));
    }

    #[test]
    fn test_stats_without_decided_entries_have_no_rate() {
        let entries =
            vec![record_and_match("0x1", 1, &recommendation(Vote::For), None).unwrap()];
        let stats = AgreementStats::from_entries(&entries);
        assert_eq!(stats.match_rate, None);
        assert_eq!(AgreementStats::from_entries(&[]).match_rate, None);
    }
}
