//! Conformance check for model output
//!
//! Validation runs through `jsonschema` against a relaxed copy of the
//! caller's schema: `enum` is dropped, so membership in a closed set stays
//! the consumer's job, and optional properties also accept `null`, which is
//! treated as absent.

use serde_json::{json, Map, Value};

/// Check `value` against `schema`, collecting every violation.
pub fn check(value: &Value, schema: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::validator_for(&relax(schema))
        .map_err(|e| vec![format!("invalid schema: {}", e)])?;

    let violations: Vec<String> = validator.iter_errors(value).map(|e| e.to_string()).collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Copy of `schema` with `enum` removed and optional properties nullable
pub fn relax(schema: &Value) -> Value {
    match schema {
        Value::Object(object) => {
            let required: Vec<&str> = object
                .get("required")
                .and_then(Value::as_array)
                .map(|keys| keys.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();

            let mut relaxed = Map::new();
            for (key, sub) in object {
                match key.as_str() {
                    "enum" => {}
                    "properties" => {
                        let properties = sub
                            .as_object()
                            .map(|props| {
                                props
                                    .iter()
                                    .map(|(name, prop)| {
                                        let prop = relax(prop);
                                        if required.contains(&name.as_str()) {
                                            (name.clone(), prop)
                                        } else {
                                            (name.clone(), nullable(prop))
                                        }
                                    })
                                    .collect::<Map<_, _>>()
                            })
                            .map(Value::Object)
                            .unwrap_or_else(|| sub.clone());
                        relaxed.insert(key.clone(), properties);
                    }
                    _ => {
                        relaxed.insert(key.clone(), relax(sub));
                    }
                }
            }
            Value::Object(relaxed)
        }
        Value::Array(items) => Value::Array(items.iter().map(relax).collect()),
        other => other.clone(),
    }
}

fn nullable(mut prop: Value) -> Value {
    let widened = match prop.get("type") {
        Some(Value::String(name)) if name != "null" => Some(json!([name, "null"])),
        Some(Value::Array(names)) if !names.iter().any(|n| n == "null") => {
            let mut names = names.clone();
            names.push(Value::from("null"));
            Some(Value::Array(names))
        }
        _ => None,
    };
    if let (Some(widened), Some(object)) = (widened, prop.as_object_mut()) {
        object.insert("type".to_string(), widened);
    }
    prop
}
