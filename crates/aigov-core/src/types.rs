//! Core types for proposals, preferences, and votes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

/// Relational identifier of a proposal.
pub type ProposalId = u64;

/// Normalize a voter address for comparison and storage.
///
/// Addresses are hex account identifiers, so case carries no meaning.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Declares an integer newtype that can only hold values in `[min, max]`.
macro_rules! bounded_int {
    ($(#[$meta:meta])* $name:ident, $field:literal, $min:literal, $max:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "u8")]
        pub struct $name(u8);

        impl $name {
            pub const MIN: u8 = $min;
            pub const MAX: u8 = $max;

            /// Create a value, rejecting anything outside the allowed range.
            pub fn new(value: i64) -> Result<Self, ValidationError> {
                if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
                    Ok(Self(value as u8))
                } else {
                    Err(ValidationError::out_of_range(
                        $field,
                        value,
                        i64::from(Self::MIN),
                        i64::from(Self::MAX),
                    ))
                }
            }

            pub fn get(self) -> u8 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = ValidationError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

bounded_int!(
    /// AI-assessed risk of a proposal, 1 (lowest) to 10 (highest).
    RiskScore,
    "risk_score",
    1,
    10
);

bounded_int!(
    /// How much risk a member is willing to accept, 1 to 10.
    RiskTolerance,
    "risk_tolerance",
    1,
    10
);

bounded_int!(
    /// Weight a member assigns to one proposal area, 1 to 5.
    PriorityWeight,
    "priority",
    1,
    5
);

bounded_int!(
    /// Confidence of a recommendation in percent, 0 to 100.
    Confidence,
    "confidence",
    0,
    100
);

/// Proposal category assigned by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Finance,
    Community,
    Protocol,
    Governance,
    Technical,
    Marketing,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Finance,
        Category::Community,
        Category::Protocol,
        Category::Governance,
        Category::Technical,
        Category::Marketing,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Finance => "Finance",
            Category::Community => "Community",
            Category::Protocol => "Protocol",
            Category::Governance => "Governance",
            Category::Technical => "Technical",
            Category::Marketing => "Marketing",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = trim_literal(s);
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(cleaned))
            .ok_or_else(|| ValidationError::UnknownLiteral {
                field: "category",
                value: s.trim().to_string(),
            })
    }
}

/// How aggressively a delegate should vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotingStrategy {
    Conservative,
    Balanced,
    Progressive,
}

impl VotingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingStrategy::Conservative => "conservative",
            VotingStrategy::Balanced => "balanced",
            VotingStrategy::Progressive => "progressive",
        }
    }
}

impl fmt::Display for VotingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VotingStrategy {
    type Err = ValidationError;

    /// Exactly one of the three lowercase literals. No case folding: the
    /// stored literal set is fixed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conservative" => Ok(VotingStrategy::Conservative),
            "balanced" => Ok(VotingStrategy::Balanced),
            "progressive" => Ok(VotingStrategy::Progressive),
            other => Err(ValidationError::UnknownLiteral {
                field: "voting_strategy",
                value: other.to_string(),
            }),
        }
    }
}

/// A vote direction.
///
/// `Abstain` only ever appears as the recommendation fallback sentinel. It
/// means "no recommendation available" and is never a ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vote {
    For,
    Against,
    Abstain,
}

impl Vote {
    /// The on-chain ballot for this vote, `None` for `Abstain`.
    pub fn as_ballot(&self) -> Option<bool> {
        match self {
            Vote::For => Some(true),
            Vote::Against => Some(false),
            Vote::Abstain => None,
        }
    }

    pub fn from_ballot(ballot: bool) -> Self {
        if ballot {
            Vote::For
        } else {
            Vote::Against
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::For => "For",
            Vote::Against => "Against",
            Vote::Abstain => "Abstain",
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a vote was cast by the member or by their AI delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    Manual,
    Delegate,
}

/// Lifecycle status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    #[default]
    Pending,
    Active,
    Executed,
    Rejected,
}

impl FromStr for ProposalStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProposalStatus::Pending),
            "active" => Ok(ProposalStatus::Active),
            "executed" => Ok(ProposalStatus::Executed),
            "rejected" => Ok(ProposalStatus::Rejected),
            other => Err(ValidationError::UnknownLiteral {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// AI-derived attributes of a proposal.
///
/// Produced once per proposal by the analyzer and immutable afterwards
/// except for explicit reanalysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalAttributes {
    /// Short TL;DR summary
    pub summary: String,

    /// Risk from 1 (lowest) to 10 (highest)
    pub risk_score: RiskScore,

    /// Category from the fixed set
    pub category: Category,

    /// Why the category and risk score fit
    pub explanation: String,
}

/// An AI delegate's recommendation for one proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecommendation {
    pub vote: Vote,
    pub confidence: Confidence,
    pub reasoning: String,
}

/// A persisted proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub title: String,
    pub description: String,
    pub author_address: String,

    /// Content-store id of the full proposal document, empty if the
    /// content store was unavailable at creation time
    pub content_id: String,

    #[serde(default)]
    pub status: ProposalStatus,

    pub created_at: DateTime<Utc>,
}

/// A cast vote. At most one exists per (proposal_id, voter_address).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub proposal_id: ProposalId,
    pub voter_address: String,

    /// `true` for For, `false` for Against
    pub vote_type: bool,

    pub is_delegate_vote: bool,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

impl VoteRecord {
    pub fn kind(&self) -> VoteKind {
        if self.is_delegate_vote {
            VoteKind::Delegate
        } else {
            VoteKind::Manual
        }
    }
}

/// Agreement record between an AI recommendation and the member's own vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateHistoryEntry {
    pub address: String,
    pub proposal_id: ProposalId,

    /// The member's own choice, once known
    pub user_vote: Option<bool>,

    pub ai_recommendation: bool,

    /// `None` while the member's own choice is unknown. Unknown is not a
    /// mismatch.
    #[serde(rename = "match")]
    pub matched: Option<bool>,

    pub created_at: DateTime<Utc>,
}

/// Strip surrounding whitespace, quotes, and trailing punctuation from a
/// one-word literal.
pub(crate) fn trim_literal(s: &str) -> &str {
    s.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '`')
        .trim_end_matches(|c: char| c == '.' || c == '!' || c == ',' || c == ';' || c == ':')
        .trim()
}
