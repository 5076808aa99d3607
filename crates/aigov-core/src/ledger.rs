//! One-vote-per-voter ledger.
//!
//! Each (proposal, voter) pair moves from `NoVote` to `Voted` exactly once.
//! `Voted` is terminal: a second attempt is rejected and never overwrites.

use std::collections::BTreeMap;

use crate::types::{normalize_address, ProposalId, VoteKind};
use crate::ValidationError;

/// State of one (proposal, voter) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    NoVote,
    Voted(VoteKind),
}

/// Tracks which voters have voted on which proposals.
#[derive(Debug, Default, Clone)]
pub struct VoteLedger {
    entries: BTreeMap<(ProposalId, String), VoteKind>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, proposal_id: ProposalId, voter: &str) -> LedgerState {
        self.entries
            .get(&(proposal_id, normalize_address(voter)))
            .map(|kind| LedgerState::Voted(*kind))
            .unwrap_or(LedgerState::NoVote)
    }

    /// Check that a pair may still vote, without recording anything.
    pub fn check(&self, proposal_id: ProposalId, voter: &str) -> Result<(), ValidationError> {
        match self.state(proposal_id, voter) {
            LedgerState::NoVote => Ok(()),
            LedgerState::Voted(_) => Err(ValidationError::DuplicateVote {
                proposal_id,
                voter: normalize_address(voter),
            }),
        }
    }

    /// Transition a pair from `NoVote` to `Voted`.
    pub fn cast(
        &mut self,
        proposal_id: ProposalId,
        voter: &str,
        kind: VoteKind,
    ) -> Result<(), ValidationError> {
        self.check(proposal_id, voter)?;
        self.entries.insert((proposal_id, normalize_address(voter)), kind);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
