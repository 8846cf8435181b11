//! Argument validation driven by each tool's advertised input schema.
//!
//! Every violation is collected before anything is deserialized, so a caller
//! sees all missing or malformed fields at once.

use jsonschema::{Draft, Validator};
use rmcp::model::JsonObject;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::args::ArgumentCheck;
use super::ToolId;
use crate::error::WorkspaceError;

/// Compile a tool input schema.
pub fn compile_schema(schema: &JsonObject) -> Result<Validator, WorkspaceError> {
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(&Value::Object(schema.clone()))
        .map_err(|err| WorkspaceError::Internal(format!("invalid input schema: {err}")))
}

/// Check `args` against `tool`'s schema, then deserialize into `T` and run
/// its cross-field checks.
pub fn validate<T>(tool: ToolId, args: &JsonObject) -> Result<T, WorkspaceError>
where
    T: DeserializeOwned + ArgumentCheck,
{
    let validator = tool.validator()?;
    let violations = schema_violations(&validator, &tool.input_schema(), args);
    if !violations.is_empty() {
        return Err(WorkspaceError::Validation(violations));
    }
    let parsed: T = serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| WorkspaceError::Validation(vec![e.to_string()]))?;
    let violations = parsed.violations();
    if !violations.is_empty() {
        return Err(WorkspaceError::Validation(violations));
    }
    Ok(parsed)
}

/// Schema errors for `args`, plus blank strings in required fields.
pub fn schema_violations(validator: &Validator, schema: &JsonObject, args: &JsonObject) -> Vec<String> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    // Nulls on optional fields mean "absent".
    let instance: JsonObject = args
        .iter()
        .filter(|(k, v)| !v.is_null() || required.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let instance = Value::Object(instance);
    let mut out: Vec<String> = validator
        .iter_errors(&instance)
        .map(|err| {
            let path = field_path(&err.instance_path().to_string());
            if path.is_empty() {
                err.to_string()
            } else {
                format!("field '{}': {}", path, err)
            }
        })
        .collect();

    for field in required {
        if let Some(Value::String(s)) = args.get(field) {
            if s.trim().is_empty() {
                out.push(format!("field '{}' must not be empty", field));
            }
        }
    }
    out
}

/// `/to/1` -> `to[1]`.
fn field_path(pointer: &str) -> String {
    let mut out = String::new();
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        if segment.chars().all(|c| c.is_ascii_digit()) {
            out.push_str(&format!("[{}]", segment));
        } else {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(&segment.replace("~1", "/").replace("~0", "~"));
        }
    }
    out
}
