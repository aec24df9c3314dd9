//! Minimal JSON Schema checks for tool parameters.
//!
//! Only the subset the built-in tools declare is understood: an object
//! schema with `properties`, `required`, and primitive `type`s on each
//! property. Unknown keywords are ignored.

use serde_json::Value;

const PRIMITIVE_TYPES: &[&str] = &["string", "number", "integer", "boolean", "array", "object"];

/// Check that a declared parameter schema is a well-formed object schema.
pub fn validate_schema(schema: &Value) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "schema must be a JSON object".to_string())?;

    if obj.get("type").and_then(Value::as_str) != Some("object") {
        return Err("schema type must be \"object\"".into());
    }

    let properties = match obj.get("properties") {
        Some(Value::Object(props)) => props,
        Some(_) => return Err("properties must be an object".into()),
        None => return Err("schema is missing properties".into()),
    };

    for (name, prop) in properties {
        if let Some(ty) = prop.get("type") {
            match ty.as_str() {
                Some(t) if PRIMITIVE_TYPES.contains(&t) => {}
                _ => return Err(format!("property '{name}' has unsupported type {ty}")),
            }
        }
    }

    if let Some(required) = obj.get("required") {
        let required = required
            .as_array()
            .ok_or_else(|| "required must be an array".to_string())?;
        for key in required {
            let key = key
                .as_str()
                .ok_or_else(|| "required entries must be strings".to_string())?;
            if !properties.contains_key(key) {
                return Err(format!("required property '{key}' is not declared"));
            }
        }
    }

    Ok(())
}

/// Check call arguments against a schema accepted by [`validate_schema`].
pub fn validate_arguments(schema: &Value, args: &Value) -> Result<(), String> {
    let args = args
        .as_object()
        .ok_or_else(|| format!("arguments must be a JSON object, got {}", type_name(args)))?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        let missing: Vec<&str> = required
            .iter()
            .filter_map(Value::as_str)
            .filter(|key| args.get(*key).is_none_or(Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing required field(s): {}", missing.join(", ")));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in args {
        if value.is_null() {
            continue;
        }
        let Some(expected) = properties
            .get(key)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        if !matches_type(expected, value) {
            return Err(format!(
                "field '{key}' must be {expected}, got {}",
                type_name(value)
            ));
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
