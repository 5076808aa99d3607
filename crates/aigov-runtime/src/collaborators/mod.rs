//! External systems the governance service depends on.
//!
//! Each is a trait with an in-memory implementation. The service only
//! holds trait objects, so tests and `mode: mock` swap backends without
//! touching service code.

pub mod chain;
pub mod content;
pub mod store;

pub use chain::{ChainClient, ChainError, InMemoryChain, OnChainProposal, SubmittedVote};
pub use content::{
    content_id, gateway_url, ContentId, ContentStore, ContentStoreError, InMemoryContentStore,
    ProposalDocument, DEFAULT_GATEWAY,
};
#[cfg(feature = "ipfs")]
pub use content::IpfsContentStore;
pub use store::{GovernanceStore, InMemoryStore, NewProposalRecord, StoreError};
