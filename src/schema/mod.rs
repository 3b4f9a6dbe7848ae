//! Fill schema (`schema.json`).
//!
//! The schema describes the content slots of a visual as a JSON-schema
//! subset: an object with typed `properties`. The orchestrator validates it
//! structurally and derives demo fill content from it; the heavy lifting of
//! real content production is not a dev-loop concern.

pub mod fill;

use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the per-visual schema file.
pub const SCHEMA_FILE: &str = "schema.json";

/// Property types the fill generator understands.
const KNOWN_TYPES: &[&str] = &["string", "number", "integer", "boolean", "array", "object"];

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("IO error when reading `{0}`")]
    Io(std::path::PathBuf, #[source] std::io::Error),

    #[error("Schema parsing error")]
    Json(#[from] serde_json::Error),

    #[error("schema validation failed: {0}")]
    Invalid(String),
}

/// Load and structurally validate `schema.json` from a visual directory.
pub fn load(visual_path: &Path) -> Result<Value, SchemaError> {
    let path = visual_path.join(SCHEMA_FILE);
    let text = fs::read_to_string(&path).map_err(|e| SchemaError::Io(path.clone(), e))?;
    let schema: Value = serde_json::from_str(&text)?;
    validate(&schema)?;
    Ok(schema)
}

/// Structural validation: the root must be an object schema whose
/// properties carry known types.
pub fn validate(schema: &Value) -> Result<(), SchemaError> {
    let root = schema
        .as_object()
        .ok_or_else(|| SchemaError::Invalid("root must be an object".into()))?;

    if root.get("type").and_then(Value::as_str) != Some("object") {
        return Err(SchemaError::Invalid(
            "root `type` must be \"object\"".into(),
        ));
    }

    let properties = root
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::Invalid("missing `properties` object".into()))?;

    for (name, prop) in properties {
        let Some(prop) = prop.as_object() else {
            return Err(SchemaError::Invalid(format!(
                "property `{name}` must be an object"
            )));
        };
        // enum-only properties carry no type
        if prop.contains_key("enum") {
            continue;
        }
        match prop.get("type").and_then(Value::as_str) {
            Some(t) if KNOWN_TYPES.contains(&t) => {}
            Some(t) => {
                return Err(SchemaError::Invalid(format!(
                    "property `{name}` has unknown type `{t}`"
                )));
            }
            None => {
                return Err(SchemaError::Invalid(format!(
                    "property `{name}` is missing `type`"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_minimal_object() {
        let schema = json!({"type": "object", "properties": {}});
        assert!(validate(&schema).is_ok());
    }

    #[test]
    fn test_validate_typed_properties() {
        let schema = json!({
            "type": "object",
            "properties": {
                "headline": {"type": "string"},
                "count": {"type": "integer"},
                "cta": {"enum": ["buy", "try"]}
            }
        });
        assert!(validate(&schema).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_object_root() {
        assert!(validate(&json!([1, 2])).is_err());
        assert!(validate(&json!({"type": "array", "properties": {}})).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let schema = json!({
            "type": "object",
            "properties": {"x": {"type": "datetime"}}
        });
        let err = validate(&schema).unwrap_err();
        assert!(err.to_string().contains("datetime"));
    }

    #[test]
    fn test_validate_rejects_untyped_property() {
        let schema = json!({
            "type": "object",
            "properties": {"x": {"description": "no type"}}
        });
        assert!(validate(&schema).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(matches!(load(temp.path()), Err(SchemaError::Io(..))));
    }
}
