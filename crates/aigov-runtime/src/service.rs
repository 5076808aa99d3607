//! The governance service: proposals, preferences, votes and agreement.
//!
//! Every collaborator is injected through [`ServiceBuilder`]; the service
//! owns no global state. Oracle outages never fail a request: analysis and
//! recommendation fall back to fixed values. Chain submission runs in the
//! background and only logs its failures. A document the content store
//! refuses is written again in the background before the proposal goes on
//! chain.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;

use aigov_core::{
    normalize_address, record_and_match, AgreementStats, Category, DelegateHistoryEntry,
    LedgerState, PreferenceProfile, Proposal, ProposalAttributes, ProposalId, ProposalStatus,
    RiskScore, ValidationError, VoteRecommendation, VoteRecord,
};

use crate::analyzer::ProposalAnalyzer;
use crate::cache::{AnalysisCache, CacheConfig};
use crate::collaborators::{
    gateway_url, ChainClient, ContentStore, ContentStoreError, GovernanceStore, InMemoryChain,
    InMemoryContentStore, InMemoryStore, NewProposalRecord, OnChainProposal, ProposalDocument,
    StoreError, DEFAULT_GATEWAY,
};
use crate::config::{AppConfig, ConfigError, ContentBackend, Mode};
use crate::oracle::{GuardedOracle, Oracle, ProviderOracle, ScriptedOracle};
use crate::providers::ProviderRegistry;
use crate::recommender::DelegateRecommender;
use crate::resilience::{BudgetTracker, CircuitBreaker, CircuitBreakerConfig};

/// Explanation stored with votes the member cast themselves.
pub const MANUAL_VOTE_EXPLANATION: &str = "User manual vote";

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Background attempts at a document write that failed inline.
const CONTENT_RETRIES: u32 = 5;
/// Delay before the first background attempt; doubles after each failure.
const CONTENT_RETRY_BASE: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Store failure: {0}")]
    Store(String),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Rejected(v) => ServiceError::Validation(v),
            StoreError::NotFound { entity, key } => ServiceError::NotFound { entity, key },
            StoreError::Backend(msg) => ServiceError::Store(msg),
        }
    }
}

fn not_found(entity: &'static str, key: impl ToString) -> ServiceError {
    ServiceError::NotFound {
        entity,
        key: key.to_string(),
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(())
    }
}

/// The text the oracle sees for a proposal.
pub fn proposal_text(title: &str, description: &str) -> String {
    format!("Title: {title}\nDescription: {description}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProposal {
    pub title: String,
    pub description: String,
    pub author_address: String,
}

/// A proposal with its analysis headline and chain placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalView {
    pub id: ProposalId,
    pub title: String,
    pub author_address: String,
    pub content_id: String,
    pub content_url: Option<String>,
    pub summary: String,
    pub risk_score: RiskScore,
    pub category: Category,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub on_chain_id: Option<u64>,
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub total: usize,
    #[serde(rename = "for")]
    pub votes_for: usize,
    #[serde(rename = "against")]
    pub votes_against: usize,
}

impl VoteTally {
    pub fn from_votes(votes: &[VoteRecord]) -> Self {
        let votes_for = votes.iter().filter(|v| v.vote_type).count();
        Self {
            total: votes.len(),
            votes_for,
            votes_against: votes.len() - votes_for,
        }
    }
}

/// Everything known about one proposal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalDetail {
    pub proposal: Proposal,
    pub content_url: Option<String>,
    pub full_description: String,
    pub analysis: ProposalAttributes,
    pub chain: Option<OnChainProposal>,
    pub tally: VoteTally,
    pub votes: Vec<VoteRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub proposal_id: ProposalId,
    pub voter_address: String,

    /// The member's ballot. Required for manual votes; for delegate votes
    /// it is the member's own choice, used only for agreement tracking.
    #[serde(default)]
    pub vote: Option<bool>,

    #[serde(default)]
    pub delegate_vote: bool,
}

impl VoteRequest {
    pub fn manual(proposal_id: ProposalId, voter: impl Into<String>, vote: bool) -> Self {
        Self {
            proposal_id,
            voter_address: voter.into(),
            vote: Some(vote),
            delegate_vote: false,
        }
    }

    pub fn delegate(proposal_id: ProposalId, voter: impl Into<String>) -> Self {
        Self {
            proposal_id,
            voter_address: voter.into(),
            vote: None,
            delegate_vote: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VoteOutcome {
    /// A vote was stored and queued for chain submission.
    Recorded {
        vote: VoteRecord,
        recommendation: Option<VoteRecommendation>,
    },

    /// The delegate could not recommend; nothing was stored and the member
    /// should vote manually.
    NoRecommendation { reasoning: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

pub struct GovernanceService {
    analyzer: ProposalAnalyzer,
    recommender: DelegateRecommender,
    oracle: Arc<GuardedOracle>,
    cache: AnalysisCache,
    store: Arc<dyn GovernanceStore>,
    content: Arc<dyn ContentStore>,
    chain: Arc<dyn ChainClient>,
    gateway: String,
    background: Mutex<JoinSet<()>>,
}

impl GovernanceService {
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    pub fn analyzer(&self) -> &ProposalAnalyzer {
        &self.analyzer
    }

    pub fn recommender(&self) -> &DelegateRecommender {
        &self.recommender
    }

    /// Store, analyze and persist a proposal, then submit it on chain in
    /// the background.
    pub async fn create_proposal(&self, new: NewProposal) -> Result<ProposalView, ServiceError> {
        require("title", &new.title)?;
        require("description", &new.description)?;
        require("author_address", &new.author_address)?;

        let document = ProposalDocument {
            title: new.title.clone(),
            description: new.description.clone(),
            author: new.author_address.clone(),
            timestamp: Utc::now(),
        };
        let content_id = match put_document(self.content.as_ref(), &document).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    store = self.content.name(),
                    error = %e,
                    "Content store failed, retrying in the background"
                );
                String::new()
            }
        };

        let attributes = self
            .analyze_cached(&proposal_text(&new.title, &new.description))
            .await?;

        let proposal = self
            .store
            .create_proposal(
                NewProposalRecord {
                    title: new.title,
                    description: new.description,
                    author_address: new.author_address,
                    content_id,
                    status: ProposalStatus::Pending,
                },
                attributes.clone(),
            )
            .await?;

        tracing::info!(
            proposal_id = proposal.id,
            category = %attributes.category,
            risk_score = attributes.risk_score.get(),
            fallback = attributes.is_fallback(),
            "Proposal created"
        );

        if proposal.content_id.is_empty() {
            self.spawn_content_backfill(proposal.id, document);
        } else {
            self.spawn_proposal_submission(proposal.id, proposal.content_id.clone());
        }
        Ok(self.view(proposal, &attributes, None))
    }

    pub async fn get_proposal(&self, id: ProposalId) -> Result<ProposalView, ServiceError> {
        let proposal = self
            .store
            .get_proposal(id)
            .await?
            .ok_or_else(|| not_found("proposal", id))?;
        let analysis = self
            .store
            .get_analysis(id)
            .await?
            .ok_or_else(|| not_found("proposal analysis", id))?;
        let chain = self.chain_data(id).await;
        Ok(self.view(proposal, &analysis, chain))
    }

    /// Proposals in id order, [`DEFAULT_PAGE_SIZE`] at a time unless `limit`
    /// says otherwise. Chain data is looked up concurrently.
    pub async fn list_proposals(
        &self,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<ProposalView>, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let proposals = self.store.list_proposals(skip, limit).await?;

        let mut analysed = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            match self.store.get_analysis(proposal.id).await? {
                Some(analysis) => analysed.push((proposal, analysis)),
                None => {
                    tracing::warn!(proposal_id = proposal.id, "Proposal has no analysis, skipped")
                }
            }
        }

        let lookups = analysed.iter().map(|(p, _)| self.chain_data(p.id));
        let chain = futures::future::join_all(lookups).await;

        Ok(analysed
            .into_iter()
            .zip(chain)
            .map(|((proposal, analysis), chain)| self.view(proposal, &analysis, chain))
            .collect())
    }

    pub async fn proposal_detail(&self, id: ProposalId) -> Result<ProposalDetail, ServiceError> {
        let proposal = self
            .store
            .get_proposal(id)
            .await?
            .ok_or_else(|| not_found("proposal", id))?;
        let analysis = self
            .store
            .get_analysis(id)
            .await?
            .ok_or_else(|| not_found("proposal analysis", id))?;

        let full_description = self.full_description(&proposal).await;
        let chain = self.chain_data(id).await;
        let votes = self.store.votes_for(id).await?;

        Ok(ProposalDetail {
            content_url: self.content_url(&proposal.content_id),
            full_description,
            analysis,
            chain,
            tally: VoteTally::from_votes(&votes),
            votes,
            proposal,
        })
    }

    pub async fn set_preferences(
        &self,
        address: &str,
        profile: PreferenceProfile,
    ) -> Result<(), ServiceError> {
        require("user_address", address)?;
        profile.validate()?;
        self.store.upsert_profile(address, profile).await?;
        tracing::info!(address = %normalize_address(address), "Delegate preferences saved");
        Ok(())
    }

    pub async fn get_preferences(&self, address: &str) -> Result<PreferenceProfile, ServiceError> {
        self.store
            .get_profile(address)
            .await?
            .ok_or_else(|| not_found("delegate preferences", normalize_address(address)))
    }

    /// Cast a manual or delegate vote.
    ///
    /// A voter gets one vote per proposal. A delegate vote whose
    /// recommendation is the Abstain fallback stores nothing.
    pub async fn cast_vote(&self, request: VoteRequest) -> Result<VoteOutcome, ServiceError> {
        require("voter_address", &request.voter_address)?;
        let voter = normalize_address(&request.voter_address);
        let proposal_id = request.proposal_id;

        let proposal = self
            .store
            .get_proposal(proposal_id)
            .await?
            .ok_or_else(|| not_found("proposal", proposal_id))?;

        if let LedgerState::Voted(_) = self.store.vote_state(proposal_id, &voter).await? {
            return Err(ValidationError::DuplicateVote { proposal_id, voter }.into());
        }

        if !request.delegate_vote {
            let ballot = request.vote.ok_or(ValidationError::EmptyField("vote"))?;
            let vote = VoteRecord {
                proposal_id,
                voter_address: voter.clone(),
                vote_type: ballot,
                is_delegate_vote: false,
                explanation: MANUAL_VOTE_EXPLANATION.to_string(),
                created_at: Utc::now(),
            };
            self.store.record_vote(vote.clone(), None).await?;
            tracing::info!(proposal_id, voter = %voter, vote = ballot, "Manual vote cast");
            self.spawn_vote_submission(proposal_id, voter, ballot);
            return Ok(VoteOutcome::Recorded {
                vote,
                recommendation: None,
            });
        }

        let profile = self
            .store
            .get_profile(&voter)
            .await?
            .ok_or_else(|| ValidationError::MissingProfile(voter.clone()))?;
        let attributes = self
            .store
            .get_analysis(proposal_id)
            .await?
            .ok_or(ValidationError::MissingAnalysis(proposal_id))?;

        let description = self.full_description(&proposal).await;
        let recommendation = self
            .recommender
            .recommend(&attributes, &profile, &proposal_text(&proposal.title, &description))
            .await;

        let Some(ballot) = recommendation.vote.as_ballot() else {
            tracing::info!(
                proposal_id,
                voter = %voter,
                "No delegate recommendation, nothing recorded"
            );
            return Ok(VoteOutcome::NoRecommendation {
                reasoning: recommendation.reasoning,
            });
        };

        let history = record_and_match(&voter, proposal_id, &recommendation, request.vote)?;
        let vote = VoteRecord {
            proposal_id,
            voter_address: voter.clone(),
            vote_type: ballot,
            is_delegate_vote: true,
            explanation: recommendation.reasoning.clone(),
            created_at: Utc::now(),
        };
        self.store.record_vote(vote.clone(), Some(history)).await?;

        tracing::info!(
            proposal_id,
            voter = %voter,
            vote = %recommendation.vote,
            confidence = recommendation.confidence.get(),
            "Delegate vote cast"
        );
        self.spawn_vote_submission(proposal_id, voter, ballot);

        Ok(VoteOutcome::Recorded {
            vote,
            recommendation: Some(recommendation),
        })
    }

    /// Record how the member themselves would have voted on a proposal
    /// their delegate voted on. No second vote is written.
    pub async fn record_user_choice(
        &self,
        address: &str,
        proposal_id: ProposalId,
        vote: bool,
    ) -> Result<DelegateHistoryEntry, ServiceError> {
        let entry = self
            .store
            .finalize_history(address, proposal_id, vote)
            .await?;
        tracing::info!(
            proposal_id,
            address = %entry.address,
            matched = ?entry.matched,
            "User choice recorded"
        );
        Ok(entry)
    }

    pub async fn delegate_history(
        &self,
        address: &str,
    ) -> Result<Vec<DelegateHistoryEntry>, ServiceError> {
        Ok(self.store.history_for(address).await?)
    }

    pub async fn agreement_stats(&self, address: &str) -> Result<AgreementStats, ServiceError> {
        let history = self.store.history_for(address).await?;
        Ok(AgreementStats::from_entries(&history))
    }

    pub fn health(&self) -> Health {
        let open = self.oracle.breaker().open_tasks();
        if !open.is_empty() {
            tracing::debug!(open_circuits = ?open, "Health check with open circuits");
        }
        Health {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Background tasks spawned and not yet reaped.
    pub fn background_tasks(&self) -> usize {
        self.background.lock().len()
    }

    /// Wait for every background submission spawned so far.
    pub async fn drain_background(&self) {
        let mut tasks = std::mem::take(&mut *self.background.lock());
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Background task panicked");
            }
        }
    }

    async fn analyze_cached(&self, text: &str) -> Result<ProposalAttributes, ValidationError> {
        if let Some(hit) = self.cache.get(text).await {
            tracing::debug!("Analysis cache hit");
            return Ok(hit);
        }
        let attributes = self.analyzer.analyze(text).await?;
        self.cache.insert(text, attributes.clone()).await;
        Ok(attributes)
    }

    /// Description from the content store, or the stored copy when the
    /// document cannot be read.
    async fn full_description(&self, proposal: &Proposal) -> String {
        if proposal.content_id.is_empty() {
            return proposal.description.clone();
        }
        match self.content.get(&proposal.content_id).await {
            Ok(document) => match document.get("description").and_then(|d| d.as_str()) {
                Some(description) => description.to_string(),
                None => proposal.description.clone(),
            },
            Err(e) => {
                tracing::warn!(
                    proposal_id = proposal.id,
                    error = %e,
                    "Content fetch failed, using stored description"
                );
                proposal.description.clone()
            }
        }
    }

    async fn chain_data(&self, proposal_id: ProposalId) -> Option<OnChainProposal> {
        match self.chain.get_proposal_data(proposal_id).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(proposal_id, error = %e, "Could not fetch chain data");
                None
            }
        }
    }

    fn content_url(&self, content_id: &str) -> Option<String> {
        (!content_id.is_empty()).then(|| gateway_url(&self.gateway, content_id))
    }

    fn view(
        &self,
        proposal: Proposal,
        analysis: &ProposalAttributes,
        chain: Option<OnChainProposal>,
    ) -> ProposalView {
        let (on_chain_id, tx_hash) = match chain {
            Some(c) => (Some(c.on_chain_id), Some(c.tx_hash)),
            None => (None, None),
        };
        ProposalView {
            content_url: self.content_url(&proposal.content_id),
            id: proposal.id,
            title: proposal.title,
            author_address: proposal.author_address,
            content_id: proposal.content_id,
            summary: analysis.summary.clone(),
            risk_score: analysis.risk_score,
            category: analysis.category,
            status: proposal.status,
            created_at: proposal.created_at,
            on_chain_id,
            tx_hash,
        }
    }

    /// Spawn `task` after reaping the tasks that already finished.
    fn spawn_background<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.background.lock();
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                tracing::error!(error = %e, "Background task panicked");
            }
        }
        tasks.spawn(task);
    }

    fn spawn_proposal_submission(&self, proposal_id: ProposalId, content_id: String) {
        let chain = Arc::clone(&self.chain);
        self.spawn_background(async move {
            submit_proposal(chain.as_ref(), proposal_id, &content_id).await;
        });
    }

    /// Retry the document write, attach the id, then submit on chain. A
    /// proposal whose document never lands is not anchored.
    fn spawn_content_backfill(&self, proposal_id: ProposalId, document: ProposalDocument) {
        let content = Arc::clone(&self.content);
        let store = Arc::clone(&self.store);
        let chain = Arc::clone(&self.chain);
        self.spawn_background(async move {
            let mut retries = 0;
            let content_id = loop {
                tokio::time::sleep(CONTENT_RETRY_BASE * 2u32.pow(retries)).await;
                match put_document(content.as_ref(), &document).await {
                    Ok(id) => break id,
                    Err(e) if retries + 1 < CONTENT_RETRIES => {
                        retries += 1;
                        tracing::debug!(
                            proposal_id,
                            retries,
                            error = %e,
                            "Content write failed again"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            proposal_id,
                            error = %e,
                            "Content write abandoned, proposal stays off chain"
                        );
                        return;
                    }
                }
            };

            if let Err(e) = store.set_content_id(proposal_id, &content_id).await {
                tracing::error!(proposal_id, error = %e, "Could not attach content id");
                return;
            }
            tracing::info!(proposal_id, content_id = %content_id, "Proposal content stored");
            submit_proposal(chain.as_ref(), proposal_id, &content_id).await;
        });
    }

    fn spawn_vote_submission(&self, proposal_id: ProposalId, voter: String, ballot: bool) {
        let chain = Arc::clone(&self.chain);
        self.spawn_background(async move {
            match chain.submit_vote(proposal_id, &voter, ballot).await {
                Ok(tx_hash) => tracing::info!(
                    proposal_id,
                    voter = %voter,
                    tx_hash = %tx_hash,
                    "Vote submitted on chain"
                ),
                Err(e) => tracing::error!(
                    proposal_id,
                    voter = %voter,
                    error = %e,
                    "Chain vote submission failed"
                ),
            }
        });
    }
}

async fn put_document(
    content: &dyn ContentStore,
    document: &ProposalDocument,
) -> Result<String, ContentStoreError> {
    let value = serde_json::to_value(document)?;
    content.put(&value).await
}

async fn submit_proposal(chain: &dyn ChainClient, proposal_id: ProposalId, content_id: &str) {
    match chain.submit_proposal(proposal_id, content_id).await {
        Ok(on_chain) => tracing::info!(
            proposal_id,
            on_chain_id = on_chain.on_chain_id,
            tx_hash = %on_chain.tx_hash,
            "Proposal submitted on chain"
        ),
        Err(e) => tracing::error!(proposal_id, error = %e, "Chain proposal submission failed"),
    }
}

/// Assembles a [`GovernanceService`]. Unset collaborators default to the
/// in-memory implementations; the oracle has no default.
pub struct ServiceBuilder {
    oracle: Option<Arc<dyn Oracle>>,
    circuit_breaker: CircuitBreakerConfig,
    oracle_timeout: Duration,
    cache: CacheConfig,
    store: Option<Arc<dyn GovernanceStore>>,
    content: Option<Arc<dyn ContentStore>>,
    chain: Option<Arc<dyn ChainClient>>,
    gateway: String,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self {
            oracle: None,
            circuit_breaker: CircuitBreakerConfig::default(),
            oracle_timeout: Duration::from_secs(15),
            cache: CacheConfig::default(),
            store: None,
            content: None,
            chain: None,
            gateway: DEFAULT_GATEWAY.to_string(),
        }
    }

    /// Builder with every collaborator chosen by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let oracle: Arc<dyn Oracle> = match config.mode {
            Mode::Mock => Arc::new(ScriptedOracle::demo()),
            Mode::Live => {
                let registry = ProviderRegistry::with_defaults();
                let settings = &config.oracle;
                registry.validate(&settings.provider, &settings.provider_config)?;
                let provider = registry.create(&settings.provider, &settings.provider_config)?;
                Arc::new(ProviderOracle::new(
                    provider,
                    settings.completion_config(),
                    Arc::new(BudgetTracker::new(settings.token_budget)),
                ))
            }
        };

        let content: Arc<dyn ContentStore> = match config.content_store.backend {
            ContentBackend::Memory => Arc::new(InMemoryContentStore::new()),
            #[cfg(feature = "ipfs")]
            ContentBackend::Ipfs => Arc::new(
                crate::collaborators::IpfsContentStore::new(
                    &config.content_store.api_url,
                    config.content_store.timeout,
                )
                .map_err(|e| ConfigError::Invalid(e.to_string()))?,
            ),
            #[cfg(not(feature = "ipfs"))]
            ContentBackend::Ipfs => {
                return Err(ConfigError::Invalid(
                    "content_store.backend 'ipfs' requires the 'ipfs' feature".to_string(),
                ))
            }
        };

        tracing::info!(
            mode = ?config.mode,
            oracle = oracle.name(),
            content_store = content.name(),
            "Governance service configured"
        );

        Ok(Self::new()
            .oracle(oracle)
            .circuit_breaker(config.circuit_breaker.clone())
            .oracle_timeout(config.oracle.timeout)
            .cache(config.cache.clone())
            .content_store(content)
            .chain(Arc::new(InMemoryChain::new()))
            .gateway(config.content_store.gateway.clone()))
    }

    pub fn oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    pub fn oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn GovernanceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn content_store(mut self, content: Arc<dyn ContentStore>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn chain(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = gateway.into();
        self
    }

    pub fn build(self) -> Result<GovernanceService, ConfigError> {
        let oracle = self
            .oracle
            .ok_or_else(|| ConfigError::Invalid("no oracle configured".to_string()))?;
        let guarded = Arc::new(GuardedOracle::new(
            oracle,
            Arc::new(CircuitBreaker::new(self.circuit_breaker)),
            self.oracle_timeout,
        ));

        Ok(GovernanceService {
            analyzer: ProposalAnalyzer::new(Arc::clone(&guarded)),
            recommender: DelegateRecommender::new(Arc::clone(&guarded)),
            oracle: guarded,
            cache: AnalysisCache::new(&self.cache),
            store: self.store.unwrap_or_else(|| Arc::new(InMemoryStore::new())),
            content: self
                .content
                .unwrap_or_else(|| Arc::new(InMemoryContentStore::new())),
            chain: self.chain.unwrap_or_else(|| Arc::new(InMemoryChain::new())),
            gateway: self.gateway,
            background: Mutex::new(JoinSet::new()),
        })
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleTask;

    fn service() -> GovernanceService {
        GovernanceService::builder()
            .oracle(Arc::new(ScriptedOracle::demo()))
            .build()
            .unwrap()
    }

    fn new_proposal(title: &str) -> NewProposal {
        NewProposal {
            title: title.to_string(),
            description: "Fund two developer grants from the community pool.".to_string(),
            author_address: "0xAuthor".to_string(),
        }
    }

    #[test]
    fn test_builder_requires_oracle() {
        assert!(matches!(
            ServiceBuilder::new().build(),
            Err(ConfigError::Invalid(msg)) if msg.contains("oracle")
        ));
    }

    #[tokio::test]
    async fn test_mock_config_builds() {
        let service = ServiceBuilder::from_config(&AppConfig::default())
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(service.health().status, "ok");
    }

    #[cfg(not(feature = "ipfs"))]
    #[test]
    fn test_ipfs_backend_needs_feature() {
        let mut config = AppConfig::default();
        config.content_store.backend = ContentBackend::Ipfs;
        assert!(ServiceBuilder::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_create_proposal_validates_fields() {
        let service = service();
        let mut blank = new_proposal("Grants");
        blank.title = "   ".to_string();
        assert!(matches!(
            service.create_proposal(blank).await,
            Err(ServiceError::Validation(ValidationError::EmptyField("title")))
        ));
    }

    #[tokio::test]
    async fn test_identical_text_is_analyzed_once() {
        let oracle = Arc::new(ScriptedOracle::demo());
        let service = GovernanceService::builder()
            .oracle(oracle.clone())
            .build()
            .unwrap();

        service.create_proposal(new_proposal("Grants")).await.unwrap();
        service.create_proposal(new_proposal("Grants")).await.unwrap();

        let summaries = oracle
            .tasks_seen()
            .into_iter()
            .filter(|t| *t == OracleTask::Summary)
            .count();
        assert_eq!(summaries, 1);
    }

    #[tokio::test]
    async fn test_manual_vote_requires_ballot() {
        let service = service();
        let view = service.create_proposal(new_proposal("Grants")).await.unwrap();

        let mut request = VoteRequest::manual(view.id, "0xVoter", true);
        request.vote = None;
        assert!(matches!(
            service.cast_vote(request).await,
            Err(ServiceError::Validation(ValidationError::EmptyField("vote")))
        ));
    }

    #[test]
    fn test_tally() {
        let vote = |vote_type| VoteRecord {
            proposal_id: 1,
            voter_address: "0x".to_string(),
            vote_type,
            is_delegate_vote: false,
            explanation: MANUAL_VOTE_EXPLANATION.to_string(),
            created_at: Utc::now(),
        };
        let tally = VoteTally::from_votes(&[vote(true), vote(true), vote(false)]);
        assert_eq!(
            tally,
            VoteTally {
                total: 3,
                votes_for: 2,
                votes_against: 1
            }
        );
        let json = serde_json::to_value(tally).unwrap();
        assert_eq!(json["for"], 2);
        assert_eq!(json["against"], 1);
    }
}
