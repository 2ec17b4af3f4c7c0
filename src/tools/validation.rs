//! Argument checks run by the gateway before dispatch.

use super::types::AgentToolParameters;
use crate::types::ToolArgumentMap;

/// Check a call's arguments against a tool's parameter schema.
///
/// Every required field must be present and non-null; declared properties
/// must have the declared JSON type. Unknown extra fields are tolerated.
pub fn validate_arguments(
    args: &ToolArgumentMap,
    parameters: &AgentToolParameters,
) -> Result<(), String> {
    for name in parameters.required() {
        match args.get(name) {
            None | Some(serde_json::Value::Null) => {
                return Err(format!("missing required argument '{name}'"));
            }
            Some(_) => {}
        }
    }

    let Some(properties) = parameters
        .schema
        .get("properties")
        .and_then(|v| v.as_object())
    else {
        return Ok(());
    };

    for (key, value) in args {
        let expected = properties
            .get(key)
            .and_then(|prop| prop.get("type"))
            .and_then(|t| t.as_str());
        if let Some(expected) = expected {
            if !value.is_null() && !value_matches_type(value, expected) {
                return Err(format!(
                    "argument '{key}' expected type '{expected}', got {}",
                    json_type_name(value)
                ));
            }
        }
    }
    Ok(())
}

fn value_matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
