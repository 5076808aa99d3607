//! # aigov-core
//!
//! Deterministic domain model for AI-assisted DAO delegate voting.
//!
//! This crate holds everything about delegate voting that does not need an
//! oracle:
//! - Proposal attributes, preference profiles, votes and history entries
//! - Validation of every numeric range and enum literal
//! - The stable textual preference block embedded in oracle prompts
//! - Coercion of raw oracle replies into typed values
//! - Agreement tracking between recommendations and real votes
//! - The one-vote-per-voter ledger state machine
//!
//! ## Key Guarantees
//!
//! 1. **No oracle calls**: all logic here is pure and synchronous
//! 2. **No silent defaults**: out-of-range values and unknown literals are
//!    `ValidationError`s, never clamped
//! 3. **Fixed fallbacks**: the fallback attribute set and recommendation are
//!    constants, reproduced exactly
//!
//! ## Example
//!
//! ```rust
//! use aigov_core::{format_preferences, PreferenceProfile};
//!
//! let profile = PreferenceProfile::from_json(r#"{
//!     "risk_tolerance": 3,
//!     "prioritize_financial": 5,
//!     "prioritize_community": 2,
//!     "prioritize_protocol": 4,
//!     "voting_strategy": "conservative"
//! }"#).unwrap();
//!
//! assert!(format_preferences(&profile).starts_with("Risk Tolerance: 3/10\n"));
//! ```

pub mod agreement;
pub mod fallback;
pub mod ledger;
pub mod parsing;
pub mod profile;
pub mod types;

pub use agreement::{record_and_match, AgreementStats};
pub use ledger::{LedgerState, VoteLedger};
pub use parsing::{parse_category, parse_confidence, parse_risk_score, parse_vote, ParseError};
pub use profile::{format_preferences, PreferenceProfile, MAX_CUSTOM_RULES_LEN};
pub use types::{
    normalize_address, Category, Confidence, DelegateHistoryEntry, PriorityWeight, Proposal,
    ProposalAttributes, ProposalId, ProposalStatus, RiskScore, RiskTolerance, Vote, VoteKind,
    VoteRecommendation, VoteRecord, VotingStrategy,
};

use thiserror::Error;

/// Rejections that are always surfaced to the caller.
///
/// A validation failure is never silently defaulted: the request that
/// produced it is refused and nothing is written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Unrecognized {field}: '{value}'")]
    UnknownLiteral { field: &'static str, value: String },

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Invalid document: {0}")]
    Document(String),

    #[error("Schema validation failed: {}", .0.join("; "))]
    Schema(Vec<String>),

    #[error("{voter} has already voted on proposal {proposal_id}")]
    DuplicateVote { proposal_id: ProposalId, voter: String },

    #[error("{0} has not set up delegate preferences")]
    MissingProfile(String),

    #[error("Proposal {0} has no analysis")]
    MissingAnalysis(ProposalId),

    #[error("No recommendation available; vote manually")]
    NoRecommendation,

    #[error("{address} already recorded a different vote on proposal {proposal_id}")]
    ConflictingUserVote {
        proposal_id: ProposalId,
        address: String,
    },
}

impl ValidationError {
    /// Build an `OutOfRange` error for a named field.
    pub fn out_of_range(field: &'static str, value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }
}
