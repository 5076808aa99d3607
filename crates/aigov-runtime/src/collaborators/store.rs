//! Relational state: proposals, analyses, profiles, votes and delegate
//! history.
//!
//! Two uniqueness rules are enforced here rather than in the service, so
//! they hold under concurrent requests: one vote per (proposal, voter) and
//! one history entry per (address, proposal).

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;

use aigov_core::{
    normalize_address, DelegateHistoryEntry, LedgerState, PreferenceProfile, Proposal,
    ProposalAttributes, ProposalId, ProposalStatus, ValidationError, VoteLedger, VoteRecord,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness or state rule was violated; nothing was written
    #[error(transparent)]
    Rejected(#[from] ValidationError),

    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Store backend failure: {0}")]
    Backend(String),
}

/// Fields of a proposal before the store assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProposalRecord {
    pub title: String,
    pub description: String,
    pub author_address: String,
    pub content_id: String,
    pub status: ProposalStatus,
}

#[async_trait]
pub trait GovernanceStore: Send + Sync {
    /// Persist a proposal together with its analysis.
    async fn create_proposal(
        &self,
        record: NewProposalRecord,
        analysis: ProposalAttributes,
    ) -> Result<Proposal, StoreError>;

    async fn get_proposal(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError>;

    /// Proposals in id order, skipping `skip` and returning at most `limit`.
    async fn list_proposals(&self, skip: usize, limit: usize) -> Result<Vec<Proposal>, StoreError>;

    async fn get_analysis(&self, id: ProposalId) -> Result<Option<ProposalAttributes>, StoreError>;

    /// Attach a content id to a proposal stored without one.
    async fn set_content_id(&self, id: ProposalId, content_id: &str) -> Result<(), StoreError>;

    /// Insert or replace a member's profile.
    async fn upsert_profile(
        &self,
        address: &str,
        profile: PreferenceProfile,
    ) -> Result<(), StoreError>;

    async fn get_profile(&self, address: &str) -> Result<Option<PreferenceProfile>, StoreError>;

    async fn vote_state(
        &self,
        proposal_id: ProposalId,
        voter: &str,
    ) -> Result<LedgerState, StoreError>;

    /// Persist a vote and, for delegate votes, its history entry. Both are
    /// written or neither is.
    async fn record_vote(
        &self,
        vote: VoteRecord,
        history: Option<DelegateHistoryEntry>,
    ) -> Result<(), StoreError>;

    async fn votes_for(&self, proposal_id: ProposalId) -> Result<Vec<VoteRecord>, StoreError>;

    /// Set the member's own choice on an existing history entry.
    async fn finalize_history(
        &self,
        address: &str,
        proposal_id: ProposalId,
        user_vote: bool,
    ) -> Result<DelegateHistoryEntry, StoreError>;

    async fn history_for(&self, address: &str) -> Result<Vec<DelegateHistoryEntry>, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    proposals: BTreeMap<ProposalId, Proposal>,
    analyses: BTreeMap<ProposalId, ProposalAttributes>,
    profiles: BTreeMap<String, PreferenceProfile>,
    ledger: VoteLedger,
    votes: BTreeMap<(ProposalId, String), VoteRecord>,
    history: BTreeMap<(String, ProposalId), DelegateHistoryEntry>,
    last_id: ProposalId,
}

/// Store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vote_count(&self) -> usize {
        self.tables.read().votes.len()
    }

    pub fn history_count(&self) -> usize {
        self.tables.read().history.len()
    }
}

#[async_trait]
impl GovernanceStore for InMemoryStore {
    async fn create_proposal(
        &self,
        record: NewProposalRecord,
        analysis: ProposalAttributes,
    ) -> Result<Proposal, StoreError> {
        let mut tables = self.tables.write();
        tables.last_id += 1;
        let id = tables.last_id;

        let proposal = Proposal {
            id,
            title: record.title,
            description: record.description,
            author_address: normalize_address(&record.author_address),
            content_id: record.content_id,
            status: record.status,
            created_at: Utc::now(),
        };
        tables.proposals.insert(id, proposal.clone());
        tables.analyses.insert(id, analysis);
        Ok(proposal)
    }

    async fn get_proposal(&self, id: ProposalId) -> Result<Option<Proposal>, StoreError> {
        Ok(self.tables.read().proposals.get(&id).cloned())
    }

    async fn list_proposals(&self, skip: usize, limit: usize) -> Result<Vec<Proposal>, StoreError> {
        Ok(self
            .tables
            .read()
            .proposals
            .values()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_analysis(&self, id: ProposalId) -> Result<Option<ProposalAttributes>, StoreError> {
        Ok(self.tables.read().analyses.get(&id).cloned())
    }

    async fn set_content_id(&self, id: ProposalId, content_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let proposal = tables.proposals.get_mut(&id).ok_or_else(|| StoreError::NotFound {
            entity: "proposal",
            key: id.to_string(),
        })?;
        proposal.content_id = content_id.to_string();
        Ok(())
    }

    async fn upsert_profile(
        &self,
        address: &str,
        profile: PreferenceProfile,
    ) -> Result<(), StoreError> {
        self.tables
            .write()
            .profiles
            .insert(normalize_address(address), profile);
        Ok(())
    }

    async fn get_profile(&self, address: &str) -> Result<Option<PreferenceProfile>, StoreError> {
        Ok(self
            .tables
            .read()
            .profiles
            .get(&normalize_address(address))
            .cloned())
    }

    async fn vote_state(
        &self,
        proposal_id: ProposalId,
        voter: &str,
    ) -> Result<LedgerState, StoreError> {
        Ok(self.tables.read().ledger.state(proposal_id, voter))
    }

    async fn record_vote(
        &self,
        vote: VoteRecord,
        history: Option<DelegateHistoryEntry>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let voter = normalize_address(&vote.voter_address);

        if !tables.proposals.contains_key(&vote.proposal_id) {
            return Err(StoreError::NotFound {
                entity: "proposal",
                key: vote.proposal_id.to_string(),
            });
        }

        // Check both constraints before writing either row
        tables.ledger.check(vote.proposal_id, &voter)?;
        if let Some(entry) = &history {
            let key = (normalize_address(&entry.address), entry.proposal_id);
            if tables.history.contains_key(&key) {
                return Err(ValidationError::DuplicateVote {
                    proposal_id: entry.proposal_id,
                    voter: key.0,
                }
                .into());
            }
        }

        tables.ledger.cast(vote.proposal_id, &voter, vote.kind())?;
        if let Some(entry) = history {
            tables
                .history
                .insert((normalize_address(&entry.address), entry.proposal_id), entry);
        }
        tables.votes.insert(
            (vote.proposal_id, voter.clone()),
            VoteRecord {
                voter_address: voter,
                ..vote
            },
        );
        Ok(())
    }

    async fn votes_for(&self, proposal_id: ProposalId) -> Result<Vec<VoteRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .votes
            .range((proposal_id, String::new())..)
            .take_while(|((id, _), _)| *id == proposal_id)
            .map(|(_, vote)| vote.clone())
            .collect())
    }

    async fn finalize_history(
        &self,
        address: &str,
        proposal_id: ProposalId,
        user_vote: bool,
    ) -> Result<DelegateHistoryEntry, StoreError> {
        let address = normalize_address(address);
        let mut tables = self.tables.write();
        let entry = tables
            .history
            .get_mut(&(address.clone(), proposal_id))
            .ok_or_else(|| StoreError::NotFound {
                entity: "delegate history entry",
                key: format!("{address}/{proposal_id}"),
            })?;

        entry.finalize(user_vote)?;
        Ok(entry.clone())
    }

    async fn history_for(&self, address: &str) -> Result<Vec<DelegateHistoryEntry>, StoreError> {
        let address = normalize_address(address);
        Ok(self
            .tables
            .read()
            .history
            .range((address.clone(), 0)..)
            .take_while(|((a, _), _)| *a == address)
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}
