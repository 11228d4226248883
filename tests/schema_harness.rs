use serde_json::json;
use xml_mcp_server::schema::{apply_defaults, validate_json, validate_value, SchemaValidationError};

#[test]
fn json_schema_harness_validates_instance() {
    let schema = r#"{
      "$schema": "https://json-schema.org/draft/2020-12/schema",
      "type": "object",
      "required": ["xpath"],
      "properties": {
        "xpath": { "type": "string", "minLength": 1 },
        "version": { "type": "string", "enum": ["3.1", "3.0", "2.0"] }
      }
    }"#;

    validate_json(schema, r#"{ "xpath": "//item", "version": "3.0" }"#)
        .expect("schema validation failed");

    let err = validate_json(schema, r#"{ "xpath": "", "version": "1.0" }"#).unwrap_err();
    match err {
        SchemaValidationError::Invalid(errors) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn defaults_fill_nested_array_items() {
    let schema = json!({
        "type": "object",
        "properties": {
            "limit": { "type": "integer", "default": 3 },
            "checks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "type": { "type": "string", "default": "xpath" }
                    }
                }
            }
        }
    });
    let mut instance = json!({
        "checks": [ {}, { "type": "xquery" } ],
        "extra": true
    });

    apply_defaults(&schema, &mut instance);

    assert_eq!(
        instance,
        json!({
            "limit": 3,
            "checks": [ { "type": "xpath" }, { "type": "xquery" } ],
            "extra": true
        })
    );
    validate_value(&schema, &instance).unwrap();
}

#[test]
fn null_values_are_replaced_by_defaults() {
    let schema = json!({
        "type": "object",
        "properties": {
            "validate": { "type": "boolean", "default": true },
            "save_output": { "type": "string" }
        }
    });
    let mut instance = json!({ "validate": null, "save_output": null });

    apply_defaults(&schema, &mut instance);

    assert_eq!(instance, json!({ "validate": true }));
}
