//! JSON Schema validation for preference profiles.
//!
//! Profiles are validated against schema/preference-profile.schema.json
//! before any typed conversion happens.

use std::sync::OnceLock;

/// Embedded profile schema (loaded at compile time).
const PROFILE_SCHEMA_JSON: &str =
    include_str!("../../../../schema/preference-profile.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = match serde_json::from_str(PROFILE_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(|e| e.clone())
}

/// Validate a profile document against the schema.
///
/// Returns every violation found, each suffixed with the JSON pointer of
/// the offending field.
pub fn validate_profile_schema(profile_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(profile_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
