//! Demo fill generation.
//!
//! Derives a sample content object from the fill schema so a visual renders
//! with plausible data during development. Regenerated whenever the schema
//! file changes.

use serde_json::{Map, Value, json};

/// Generate demo fill content for a validated schema.
pub fn generate(schema: &Value) -> Value {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return json!({});
    };

    let mut fill = Map::new();
    for (name, prop) in properties {
        fill.insert(name.clone(), sample_value(name, prop));
    }
    Value::Object(fill)
}

/// Sample value for a single property, in precedence order:
/// explicit `default`, first `examples` entry, first `enum` variant,
/// then a type-derived placeholder.
fn sample_value(name: &str, prop: &Value) -> Value {
    if let Some(default) = prop.get("default") {
        return default.clone();
    }
    if let Some(example) = prop.get("examples").and_then(|e| e.get(0)) {
        return example.clone();
    }
    if let Some(variant) = prop.get("enum").and_then(|e| e.get(0)) {
        return variant.clone();
    }

    match prop.get("type").and_then(Value::as_str) {
        Some("string") => Value::String(format!("{{{name}}}")),
        Some("number") => json!(0.0),
        Some("integer") => json!(0),
        Some("boolean") => json!(false),
        Some("array") => match prop.get("items") {
            Some(items) => json!([sample_value(name, items)]),
            None => json!([]),
        },
        Some("object") => generate(prop),
        _ => Value::Null,
    }
}
