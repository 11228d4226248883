use jsonschema::validator_for;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("Schema parse error: {0}")]
    SchemaParse(#[from] serde_json::Error),
    #[error("Schema compile error: {0}")]
    SchemaCompile(String),
    #[error("Invalid arguments: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Validate a JSON instance against a JSON Schema (draft 2020-12).
///
/// Every violation is reported, not only the first.
pub fn validate_value(schema: &Value, instance: &Value) -> Result<(), SchemaValidationError> {
    let validator =
        validator_for(schema).map_err(|e| SchemaValidationError::SchemaCompile(e.to_string()))?;

    let errors: Vec<String> = validator.iter_errors(instance).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaValidationError::Invalid(errors))
    }
}

/// String form of [`validate_value`].
pub fn validate_json(schema_str: &str, instance_str: &str) -> Result<(), SchemaValidationError> {
    let schema_json: Value = serde_json::from_str(schema_str)?;
    let instance_json: Value = serde_json::from_str(instance_str)?;
    validate_value(&schema_json, &instance_json)
}

/// Fill in schema-declared defaults.
///
/// `null` counts as absent. Object properties are defaulted recursively and
/// each element of an array is defaulted against the `items` schema.
pub fn apply_defaults(schema: &Value, instance: &mut Value) {
    match instance {
        Value::Object(map) => {
            let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
                return;
            };
            fill_object(properties, map);
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for item in items {
                    apply_defaults(item_schema, item);
                }
            }
        }
        _ => {}
    }
}

fn fill_object(properties: &Map<String, Value>, map: &mut Map<String, Value>) {
    map.retain(|_, value| !value.is_null());

    for (key, property) in properties {
        match map.get_mut(key) {
            Some(value) => apply_defaults(property, value),
            None => {
                if let Some(default) = property.get("default") {
                    let mut value = default.clone();
                    apply_defaults(property, &mut value);
                    map.insert(key.clone(), value);
                }
            }
        }
    }
}
