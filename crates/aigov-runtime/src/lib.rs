//! # aigov-runtime
//!
//! Oracle-backed proposal analysis and delegate voting.
//!
//! This crate wires the deterministic model in `aigov-core` to the outside
//! world: an LLM oracle, a content store for full proposal documents, a
//! chain client and a relational store.
//!
//! ## Important
//!
//! Oracle failures never fail a request. The analyzer falls back to a
//! fixed attribute set and the delegate falls back to a fixed Abstain
//! recommendation, which never produces a stored vote.
//!
//! Every oracle call goes through a [`GuardedOracle`], which adds a
//! per-task circuit breaker and a timeout.
//!
//! ## Example
//!
//! ```rust,ignore
//! use aigov_runtime::{GovernanceService, NewProposal, ScriptedOracle, VoteRequest};
//! use std::sync::Arc;
//!
//! let service = GovernanceService::builder()
//!     .oracle(Arc::new(ScriptedOracle::demo()))
//!     .build()?;
//!
//! let proposal = service.create_proposal(NewProposal {
//!     title: "Treasury Diversification".into(),
//!     description: "Move 20% of ETH reserves into stablecoins.".into(),
//!     author_address: "0x1234".into(),
//! }).await?;
//!
//! service.set_preferences("0xabcd", profile).await?;
//! let outcome = service.cast_vote(VoteRequest::delegate(proposal.id, "0xabcd")).await?;
//! ```

pub mod analyzer;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod oracle;
pub mod prompts;
pub mod providers;
pub mod recommender;
pub mod resilience;
pub mod service;

pub use analyzer::{AnalysisError, ProposalAnalyzer};
pub use cache::{AnalysisCache, CacheConfig};
pub use collaborators::{
    ChainClient, ChainError, ContentStore, ContentStoreError, GovernanceStore, InMemoryChain,
    InMemoryContentStore, InMemoryStore, OnChainProposal, StoreError,
};
pub use config::{AppConfig, ConfigError, Mode};
pub use oracle::{
    FailingOracle, GuardedOracle, Oracle, OracleError, OracleTask, ProviderOracle,
    ScriptedOracle,
};
pub use providers::{CompletionConfig, LlmProvider, ProviderError, ProviderRegistry};
pub use recommender::DelegateRecommender;
pub use resilience::{BudgetTracker, CircuitBreaker, CircuitBreakerConfig};
pub use service::{
    GovernanceService, Health, NewProposal, ProposalDetail, ProposalView, ServiceBuilder,
    ServiceError, VoteOutcome, VoteRequest, VoteTally,
};
