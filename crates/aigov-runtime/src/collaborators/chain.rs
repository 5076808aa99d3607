//! On-chain submission of proposals and votes.
//!
//! Submission is fire-and-forget from the service's point of view: it runs
//! in the background and its failures are logged, not returned.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use aigov_core::{normalize_address, ProposalId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Chain unavailable: {0}")]
    Unavailable(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),
}

/// Where a proposal landed on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainProposal {
    pub on_chain_id: u64,
    pub tx_hash: String,
}

/// A vote recorded by [`InMemoryChain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedVote {
    pub proposal_id: ProposalId,
    pub voter: String,
    pub vote_type: bool,
    pub tx_hash: String,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn submit_proposal(
        &self,
        proposal_id: ProposalId,
        content_id: &str,
    ) -> Result<OnChainProposal, ChainError>;

    /// Submit a ballot, returning the transaction hash.
    async fn submit_vote(
        &self,
        proposal_id: ProposalId,
        voter: &str,
        vote_type: bool,
    ) -> Result<String, ChainError>;

    async fn get_proposal_data(
        &self,
        proposal_id: ProposalId,
    ) -> Result<Option<OnChainProposal>, ChainError>;

    fn name(&self) -> &str;
}

fn tx_hash(payload: &str) -> String {
    format!("0x{}", hex::encode(Sha256::digest(payload.as_bytes())))
}

/// A chain simulated in memory, with deterministic transaction hashes.
#[derive(Debug, Default)]
pub struct InMemoryChain {
    proposals: RwLock<BTreeMap<ProposalId, OnChainProposal>>,
    votes: RwLock<Vec<SubmittedVote>>,
    offline: AtomicBool,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `Unavailable` until turned back on.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn submitted_votes(&self) -> Vec<SubmittedVote> {
        self.votes.read().clone()
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.read().len()
    }

    fn ensure_online(&self) -> Result<(), ChainError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ChainError::Unavailable("node unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainClient for InMemoryChain {
    async fn submit_proposal(
        &self,
        proposal_id: ProposalId,
        content_id: &str,
    ) -> Result<OnChainProposal, ChainError> {
        self.ensure_online()?;

        let mut proposals = self.proposals.write();
        if let Some(existing) = proposals.get(&proposal_id) {
            return Ok(existing.clone());
        }

        let on_chain = OnChainProposal {
            on_chain_id: proposals.len() as u64,
            tx_hash: tx_hash(&format!("proposal:{proposal_id}:{content_id}")),
        };
        proposals.insert(proposal_id, on_chain.clone());
        Ok(on_chain)
    }

    async fn submit_vote(
        &self,
        proposal_id: ProposalId,
        voter: &str,
        vote_type: bool,
    ) -> Result<String, ChainError> {
        self.ensure_online()?;

        let voter = normalize_address(voter);
        let mut votes = self.votes.write();
        if votes
            .iter()
            .any(|v| v.proposal_id == proposal_id && v.voter == voter)
        {
            return Err(ChainError::Rejected(format!(
                "{voter} already voted on {proposal_id}"
            )));
        }

        let hash = tx_hash(&format!("vote:{proposal_id}:{voter}:{vote_type}"));
        votes.push(SubmittedVote {
            proposal_id,
            voter,
            vote_type,
            tx_hash: hash.clone(),
        });
        Ok(hash)
    }

    async fn get_proposal_data(
        &self,
        proposal_id: ProposalId,
    ) -> Result<Option<OnChainProposal>, ChainError> {
        self.ensure_online()?;
        Ok(self.proposals.read().get(&proposal_id).cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_proposal_submission_is_idempotent() {
        let chain = InMemoryChain::new();
        let first = chain.submit_proposal(1, "QmA").await.unwrap();
        let again = chain.submit_proposal(1, "QmA").await.unwrap();
        assert_eq!(first, again);
        assert_eq!(first.on_chain_id, 0);
        assert!(first.tx_hash.starts_with("0x"));
        assert_eq!(first.tx_hash.len(), 66);

        let second = chain.submit_proposal(2, "QmB").await.unwrap();
        assert_eq!(second.on_chain_id, 1);
        assert_eq!(chain.get_proposal_data(2).await.unwrap(), Some(second));
        assert_eq!(chain.get_proposal_data(3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_second_ballot_is_rejected() {
        let chain = InMemoryChain::new();
        chain.submit_vote(1, "0xAA", true).await.unwrap();
        assert!(matches!(
            chain.submit_vote(1, "0xaa", false).await,
            Err(ChainError::Rejected(_))
        ));
        assert_eq!(chain.submitted_votes().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_chain_fails_every_call() {
        let chain = InMemoryChain::new();
        chain.set_offline(true);
        assert!(chain.submit_proposal(1, "QmA").await.is_err());
        assert!(chain.get_proposal_data(1).await.is_err());

        chain.set_offline(false);
        assert!(chain.submit_proposal(1, "QmA").await.is_ok());
    }
}
