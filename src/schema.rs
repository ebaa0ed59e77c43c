//! Parameter validation against a tool's JSON Schema.
//!
//! Supports the subset tools actually declare: `required`, property
//! `type`, `enum`, and `default`. Anything else in the schema is ignored.

use anyhow::{bail, Result};
use serde_json::{Map, Value};

/// Validates `params` against `schema` and returns them with defaults filled in.
///
/// Fails when `params` is not an object, a required field is missing, a
/// present field has the wrong type, or a value is outside its `enum`.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = match params {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => bail!("arguments must be a JSON object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for field in &required {
        match params_obj.get(*field) {
            None | Some(Value::Null) => bail!("missing required parameter: {}", field),
            Some(_) => {}
        }
    }

    let mut result = params_obj.clone();

    for (prop_name, prop_schema) in &properties {
        let Some(value) = params_obj.get(prop_name).filter(|v| !v.is_null()) else {
            if let Some(default) = prop_schema.get("default") {
                result.insert(prop_name.clone(), default.clone());
            }
            continue;
        };

        if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected_type {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                bail!(
                    "parameter '{}' must be of type '{}', got {}",
                    prop_name,
                    expected_type,
                    json_type_name(value)
                );
            }
        }

        if let Some(enum_values) = prop_schema.get("enum").and_then(|e| e.as_array()) {
            if !enum_values.contains(value) {
                let allowed: Vec<String> = enum_values.iter().map(|v| v.to_string()).collect();
                bail!(
                    "parameter '{}' must be one of [{}], got {}",
                    prop_name,
                    allowed.join(", "),
                    value
                );
            }
        }
    }

    Ok(Value::Object(result))
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "count": { "type": "integer" },
                "mode": { "type": "string", "enum": ["any", "all"], "default": "any" }
            },
            "required": ["query"]
        })
    }

    #[test]
    fn test_valid_params_get_defaults() {
        let out = validate_params(&search_schema(), &json!({ "query": "dog" })).unwrap();
        assert_eq!(out, json!({ "query": "dog", "mode": "any" }));
    }

    #[test]
    fn test_missing_required() {
        let err = validate_params(&search_schema(), &json!({ "count": 3 })).unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter: query");

        let err = validate_params(&search_schema(), &json!({ "query": null })).unwrap_err();
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn test_wrong_types() {
        let err = validate_params(&search_schema(), &json!({ "query": 7 })).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter 'query' must be of type 'string', got integer"
        );

        let err =
            validate_params(&search_schema(), &json!({ "query": "a", "count": 2.5 })).unwrap_err();
        assert!(err.to_string().contains("'count' must be of type 'integer', got number"));

        let err =
            validate_params(&search_schema(), &json!({ "query": "a", "count": "5" })).unwrap_err();
        assert!(err.to_string().contains("got string"));
    }

    #[test]
    fn test_enum_membership() {
        let err = validate_params(&search_schema(), &json!({ "query": "a", "mode": "some" }))
            .unwrap_err();
        assert!(err.to_string().contains("must be one of"));
    }

    #[test]
    fn test_non_object_payload() {
        let err = validate_params(&search_schema(), &json!(["dog"])).unwrap_err();
        assert_eq!(err.to_string(), "arguments must be a JSON object, got array");

        let err = validate_params(&search_schema(), &Value::Null).unwrap_err();
        assert!(err.to_string().contains("missing required parameter"));
    }
}
