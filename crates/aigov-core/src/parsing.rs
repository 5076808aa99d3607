//! Coercion of raw oracle replies into typed values.
//!
//! Oracle replies are free text. Each parser here accepts the small set of
//! shapes a well-behaved model produces and rejects everything else; it
//! never guesses or clamps.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::types::{trim_literal, Category, Confidence, RiskScore, Vote};
use crate::ValidationError;

lazy_static! {
    /// A whole score, optionally out of ten ("7", "7/10", "7 / 10.")
    static ref SCORE_PATTERN: Regex = Regex::new(r"^(-?\d+)\s*(?:/\s*10)?\.?$").unwrap();

    /// Optional "Label:" prefix a model may echo back from the prompt
    static ref LABEL_PREFIX: Regex = Regex::new(
        r"(?i)^\s*(vote|category|(?:risk\s+)?score(?:\s*\(1-10\))?|confidence(?:\s*\(%\))?)\s*:\s*"
    ).unwrap();
}

/// Errors coercing an oracle reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Reply contains no integer: '{0}'")]
    NoInteger(String),

    #[error("Reply is not an integer: '{0}'")]
    NotAnInteger(String),

    #[error("Reply is neither 'For' nor 'Against': '{0}'")]
    UnknownVote(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

fn strip_label(reply: &str) -> &str {
    match LABEL_PREFIX.find(reply) {
        Some(m) => &reply[m.end()..],
        None => reply,
    }
}

/// Parse a risk score reply into a score in [1, 10].
///
/// After an optional label the reply must be one integer, optionally
/// followed by `/10`. Fractions and prose are rejected.
pub fn parse_risk_score(reply: &str) -> Result<RiskScore, ParseError> {
    let reply = reply.trim();
    let body = strip_label(reply).trim();
    if !body.bytes().any(|b| b.is_ascii_digit()) {
        return Err(ParseError::NoInteger(reply.to_string()));
    }

    let value: i64 = SCORE_PATTERN
        .captures(body)
        .and_then(|c| c[1].parse().ok())
        .ok_or_else(|| ParseError::NotAnInteger(reply.to_string()))?;

    Ok(RiskScore::new(value)?)
}

/// Parse a confidence reply into a percentage in [0, 100].
///
/// A trailing `%` is stripped; the remainder must be an integer.
pub fn parse_confidence(reply: &str) -> Result<Confidence, ParseError> {
    let body = strip_label(reply.trim());
    let number = body.trim().trim_end_matches('%').trim();

    let value: i64 = number
        .parse()
        .map_err(|_| ParseError::NotAnInteger(reply.trim().to_string()))?;

    Ok(Confidence::new(value)?)
}

/// Parse a category reply into one of the fixed categories.
pub fn parse_category(reply: &str) -> Result<Category, ParseError> {
    Ok(strip_label(reply.trim()).parse::<Category>()?)
}

/// Parse a vote reply. Only `For` and `Against` are accepted.
pub fn parse_vote(reply: &str) -> Result<Vote, ParseError> {
    let word = trim_literal(strip_label(reply.trim()));

    if word.eq_ignore_ascii_case("for") {
        Ok(Vote::For)
    } else if word.eq_ignore_ascii_case("against") {
        Ok(Vote::Against)
    } else {
        Err(ParseError::UnknownVote(reply.trim().to_string()))
    }
}
