//! JSON Schema self-check for the registration payload.
//!
//! The exporter builds payload objects from typed structs, so a schema
//! violation points at a data problem (for example a phone that slipped
//! through with an unexpected shape) rather than a serialization bug.
//! Violations are reported, never fatal.
//!
//! The schema is embedded at compile time from
//! `schemas/registration-payload.json` (JSON Schema Draft 7).

use once_cell::sync::Lazy;
use serde_json::Value;

static PAYLOAD_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/registration-payload.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON value against a schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every violation otherwise
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick true/false check.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate one registration payload object.
pub fn validate_payload(data: &Value) -> Result<(), Vec<String>> {
    validate(&PAYLOAD_SCHEMA, data)
}
