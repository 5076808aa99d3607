//! Delegate preference profiles.
//!
//! A profile is one member's stated voting preferences. Profiles are parsed
//! from JSON or YAML documents, validated against an embedded JSON Schema
//! and then against the typed range rules.

mod parser;
mod schema;

pub use parser::{format_preferences, PreferenceProfile, MAX_CUSTOM_RULES_LEN};
pub use schema::validate_profile_schema;
