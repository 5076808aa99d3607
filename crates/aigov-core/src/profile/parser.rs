//! Preference profile parsing from YAML/JSON and prompt formatting.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::schema::validate_profile_schema;
use crate::types::{PriorityWeight, RiskTolerance, VotingStrategy};
use crate::ValidationError;

/// Maximum length of free-text custom rules.
pub const MAX_CUSTOM_RULES_LEN: usize = 2000;

/// A member's stated delegate-voting preferences.
///
/// One profile exists per member; storing a new one overwrites the old.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceProfile {
    /// How much risk the member accepts (1-10)
    pub risk_tolerance: RiskTolerance,

    /// Weight on treasury and financial outcomes (1-5)
    pub prioritize_financial: PriorityWeight,

    /// Weight on community outcomes (1-5)
    pub prioritize_community: PriorityWeight,

    /// Weight on protocol outcomes (1-5)
    pub prioritize_protocol: PriorityWeight,

    pub voting_strategy: VotingStrategy,

    /// Free-text rules appended to the preference block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_rules: Option<String>,
}

/// Untyped mirror used so range failures name their field.
#[derive(Deserialize)]
struct RawProfile {
    risk_tolerance: i64,
    prioritize_financial: i64,
    prioritize_community: i64,
    prioritize_protocol: i64,
    voting_strategy: String,
    #[serde(default)]
    custom_rules: Option<String>,
}

impl PreferenceProfile {
    /// Build a profile from raw values, validating every field.
    pub fn new(
        risk_tolerance: i64,
        prioritize_financial: i64,
        prioritize_community: i64,
        prioritize_protocol: i64,
        voting_strategy: &str,
        custom_rules: Option<String>,
    ) -> Result<Self, ValidationError> {
        let profile = Self {
            risk_tolerance: RiskTolerance::new(risk_tolerance)?,
            prioritize_financial: weight("prioritize_financial", prioritize_financial)?,
            prioritize_community: weight("prioritize_community", prioritize_community)?,
            prioritize_protocol: weight("prioritize_protocol", prioritize_protocol)?,
            voting_strategy: voting_strategy.parse()?,
            custom_rules,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Parse a profile from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ValidationError::Document(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Parse a profile from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ValidationError> {
        let value: serde_json::Value =
            serde_yaml::from_str(yaml).map_err(|e| ValidationError::Document(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Parse a profile from a JSON or YAML file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ValidationError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ValidationError::Document(format!("{}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Validate an already-decoded document: schema first, then typed rules.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ValidationError> {
        validate_profile_schema(value).map_err(ValidationError::Schema)?;

        let raw: RawProfile = serde_json::from_value(value.clone())
            .map_err(|e| ValidationError::Document(e.to_string()))?;

        Self::new(
            raw.risk_tolerance,
            raw.prioritize_financial,
            raw.prioritize_community,
            raw.prioritize_protocol,
            &raw.voting_strategy,
            raw.custom_rules,
        )
    }

    /// Check the constraints the field types cannot express.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(rules) = &self.custom_rules {
            if rules.chars().count() > MAX_CUSTOM_RULES_LEN {
                return Err(ValidationError::TooLong {
                    field: "custom_rules",
                    max: MAX_CUSTOM_RULES_LEN,
                });
            }
        }
        Ok(())
    }

    /// Custom rules if present and not blank.
    pub fn custom_rules(&self) -> Option<&str> {
        self.custom_rules
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

fn weight(field: &'static str, value: i64) -> Result<PriorityWeight, ValidationError> {
    PriorityWeight::new(value).map_err(|_| {
        ValidationError::out_of_range(
            field,
            value,
            i64::from(PriorityWeight::MIN),
            i64::from(PriorityWeight::MAX),
        )
    })
}

/// Render a profile as the preference block embedded in oracle prompts.
///
/// The layout is stable: later prompts echo it back, and tests compare
/// against it verbatim.
pub fn format_preferences(profile: &PreferenceProfile) -> String {
    let mut text = format!("Risk Tolerance: {}/10\n", profile.risk_tolerance);
    text.push_str(&format!(
        "Financial Priority: {}/5\n",
        profile.prioritize_financial
    ));
    text.push_str(&format!(
        "Community Priority: {}/5\n",
        profile.prioritize_community
    ));
    text.push_str(&format!(
        "Protocol Priority: {}/5\n",
        profile.prioritize_protocol
    ));
    text.push_str(&format!("Voting Strategy: {}\n", profile.voting_strategy));

    if let Some(rules) = profile.custom_rules() {
        text.push_str(&format!("Custom Rules: {}", rules));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CONSERVATIVE_YAML: &str = r#"
risk_tolerance: 2
prioritize_financial: 5
prioritize_community: 2
prioritize_protocol: 3
voting_strategy: conservative
custom_rules: "Never approve treasury spends above 5%"
"#;

    #[test]
    fn test_parse_yaml_profile() {
        let profile = PreferenceProfile::from_yaml(CONSERVATIVE_YAML).unwrap();
        assert_eq!(profile.risk_tolerance.get(), 2);
        assert_eq!(profile.voting_strategy, VotingStrategy::Conservative);
        assert_eq!(
            profile.custom_rules(),
            Some("Never approve treasury spends above 5%")
        );
    }

    #[test]
    fn test_format_preferences_with_custom_rules() {
        let profile = PreferenceProfile::from_yaml(CONSERVATIVE_YAML).unwrap();
        assert_eq!(
            format_preferences(&profile),
            "Risk Tolerance: 2/10\n\
             Financial Priority: 5/5\n\
             Community Priority: 2/5\n\
             Protocol Priority: 3/5\n\
             Voting Strategy: conservative\n\
             Custom Rules: Never approve treasury spends above 5%"
        );
    }

    #[test]
    fn test_format_preferences_omits_blank_custom_rules() {
        let profile =
            PreferenceProfile::new(7, 1, 4, 2, "progressive", Some("   ".to_string())).unwrap();
        let text = format_preferences(&profile);
        assert!(!text.contains("Custom Rules"));
        assert!(text.ends_with("Voting Strategy: progressive\n"));
    }

    #[test]
    fn test_out_of_range_weight_names_field() {
        let err = PreferenceProfile::new(5, 3, 6, 3, "balanced", None).unwrap_err();
        assert_eq!(
            err,
            ValidationError::out_of_range("prioritize_community", 6, 1, 5)
        );
    }

    #[test]
    fn test_unknown_strategy_is_rejected_not_defaulted() {
        let err = PreferenceProfile::new(5, 3, 3, 3, "aggressive", None).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnknownLiteral { field: "voting_strategy", .. }
        ));
    }

    #[test]
    fn test_json_out_of_range_fails_schema() {
        let json = r#"{
            "risk_tolerance": 0,
            "prioritize_financial": 3,
            "prioritize_community": 3,
            "prioritize_protocol": 3,
            "voting_strategy": "balanced"
        }"#;
        let err = PreferenceProfile::from_json(json).unwrap_err();
        assert!(matches!(err, ValidationError::Schema(_)));
        assert!(err.to_string().contains("risk_tolerance"));
    }

    #[test]
    fn test_malformed_json_is_document_error() {
        let err = PreferenceProfile::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ValidationError::Document(_)));
    }

    #[test]
    fn test_custom_rules_too_long() {
        let rules = "x".repeat(MAX_CUSTOM_RULES_LEN + 1);
        let err = PreferenceProfile::new(5, 3, 3, 3, "balanced", Some(rules)).unwrap_err();
        assert!(matches!(err, ValidationError::TooLong { .. }));
    }

    proptest! {
        #[test]
        fn risk_tolerance_outside_range_never_clamps(rt in prop_oneof![-50i64..1, 11i64..60]) {
            let result = PreferenceProfile::new(rt, 3, 3, 3, "balanced", None);
            let expected = ValidationError::out_of_range("risk_tolerance", rt, 1, 10);
            prop_assert_eq!(result, Err(expected));
        }

        #[test]
        fn valid_profiles_always_format_five_lines(
            rt in 1i64..=10,
            f in 1i64..=5,
            c in 1i64..=5,
            p in 1i64..=5,
            s in prop_oneof![Just("conservative"), Just("balanced"), Just("progressive")],
        ) {
            let profile = PreferenceProfile::new(rt, f, c, p, s, None).unwrap();
            let text = format_preferences(&profile);
            prop_assert_eq!(text.lines().count(), 5);
            let expected_first_line = format!("Risk Tolerance: {}/10", rt);
            prop_assert!(text.starts_with(&expected_first_line));
        }
    }
}
