use serde_json::{json, Map, Value as JsonValue};

/// Scalar subtypes understood by the built-in scalar types.
pub const SUBTYPES: [&str; 5] = ["int", "uint", "float", "complex", "bytes"];

/// JSON Schema constraining the value of a recognized type property.
///
/// Unknown property names are unconstrained.
pub fn property_schema(name: &str) -> JsonValue {
    match name {
        "type" | "title" | "description" | "units" => json!({ "type": "string" }),
        "subtype" => json!({ "enum": SUBTYPES }),
        "precision" => json!({ "type": "integer", "minimum": 0 }),
        "items" => json!({
            "anyOf": [
                typed_object(),
                { "type": "array", "items": typed_object() }
            ]
        }),
        "properties" => json!({
            "type": "object",
            "additionalProperties": typed_object()
        }),
        _ => json!({}),
    }
}

fn typed_object() -> JsonValue {
    json!({
        "type": "object",
        "required": ["type"],
        "properties": { "type": { "type": "string" } }
    })
}

/// Build the meta-schema for a type: `type` pinned to `type_name`, the given
/// keys required, every recognized property constrained.
///
/// With `closed` set, keys outside `properties` are rejected.
pub(crate) fn meta_schema(
    type_name: &str,
    properties: &[String],
    required: &[String],
    custom: &Map<String, JsonValue>,
    closed: bool,
) -> JsonValue {
    let mut props = Map::new();
    for name in properties {
        let schema = custom
            .get(name)
            .cloned()
            .unwrap_or_else(|| property_schema(name));
        props.insert(name.clone(), schema);
    }
    props.insert("type".to_string(), json!({ "const": type_name }));

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), JsonValue::Object(props));
    schema.insert("required".to_string(), json!(required));
    if closed {
        schema.insert("additionalProperties".to_string(), JsonValue::Bool(false));
    }
    JsonValue::Object(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn closed_schema_rejects_unknown_keys() {
        let schema = meta_schema(
            "scalar",
            &names(&["type", "subtype", "precision"]),
            &names(&["type", "subtype"]),
            &Map::new(),
            true,
        );
        let validator = jsonschema::validator_for(&schema).unwrap();

        assert!(validator.is_valid(&json!({"type": "scalar", "subtype": "float"})));
        assert!(!validator.is_valid(&json!({"type": "scalar"})));
        assert!(!validator.is_valid(&json!({"type": "scalar", "subtype": "float", "shape": [2]})));
        assert!(!validator.is_valid(&json!({"type": "array", "subtype": "float"})));
        assert!(!validator.is_valid(&json!({"type": "scalar", "subtype": "quaternion"})));
        assert!(!validator.is_valid(&json!({"type": "scalar", "subtype": "int", "precision": -8})));
    }

    #[test]
    fn open_schema_allows_transport_keys() {
        let schema = meta_schema(
            "array",
            &names(&["type", "items"]),
            &names(&["type", "items"]),
            &Map::new(),
            false,
        );
        let validator = jsonschema::validator_for(&schema).unwrap();

        assert!(validator.is_valid(&json!({"type": "array", "items": [{"type": "int"}], "size": 3})));
        assert!(validator.is_valid(&json!({"type": "array", "items": {"type": "int"}})));
        assert!(!validator.is_valid(&json!({"type": "array", "items": [{"precision": 3}]})));
    }
}
