use std::collections::BTreeMap;

use base64::Engine as _;
use serde_json::{Map, Value as JsonValue};

use crate::descriptor::TypeClass;
use crate::error::{CodecError, Result};
use crate::registry::TypeRegistry;
use crate::value::{Scalar, ScalarData, Value};

/// Schema for element `index` of an `items` specification, which is either
/// a per-position list or a single schema applied to every element.
pub(crate) fn child_schema(items: &JsonValue, index: usize) -> Option<&Map<String, JsonValue>> {
    match items {
        JsonValue::Object(schema) => Some(schema),
        JsonValue::Array(list) => list.get(index).and_then(JsonValue::as_object),
        _ => None,
    }
}

/// Lay out a value as payload bytes.
///
/// Scalar types use a fixed-width little-endian layout (`bytes` is copied
/// verbatim). Every other type is JSON text.
pub(crate) fn encode_data(
    registry: &TypeRegistry,
    value: &Value,
    metadata: &Map<String, JsonValue>,
) -> Result<Vec<u8>> {
    let type_name = metadata
        .get("type")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    let descriptor = registry.lookup(type_name)?;

    if descriptor.class().is_binary() {
        return match value {
            Value::Scalar(scalar) => scalar_bytes(scalar),
            Value::Bytes(bytes) => Ok(bytes.clone()),
            other => Err(CodecError::encode(
                type_name,
                other,
                format!("{} value has no binary layout", other.kind()),
            )),
        };
    }
    Ok(serde_json::to_vec(&wire_json(value)?)?)
}

/// Parse payload bytes described by `metadata`.
pub(crate) fn decode_data(
    registry: &TypeRegistry,
    data: &[u8],
    metadata: &Map<String, JsonValue>,
) -> Result<Value> {
    let type_name = metadata
        .get("type")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    let descriptor = registry.lookup(type_name)?;

    if descriptor.class().is_binary() {
        let target = ScalarLayout::from_schema(descriptor.class(), metadata)?;
        if target.subtype == "bytes" {
            return Ok(Value::Bytes(data.to_vec()));
        }
        let parsed = scalar_from_bytes(&target.subtype, target.precision, data).ok_or_else(|| {
            decode_error(
                metadata,
                format!(
                    "{} bytes are not a {}-bit {}",
                    data.len(),
                    target.precision,
                    target.subtype
                ),
            )
        })?;
        return Ok(Value::Scalar(Scalar {
            data: parsed,
            precision: target.precision,
            units: target.units,
        }));
    }

    let json: JsonValue = serde_json::from_slice(data)?;
    from_wire_json(registry, json, metadata)
}

struct ScalarLayout {
    subtype: String,
    precision: u16,
    units: String,
}

impl ScalarLayout {
    fn from_schema(class: &TypeClass, schema: &Map<String, JsonValue>) -> Result<Self> {
        let subtype = class
            .fixed_subtype()
            .or_else(|| schema.get("subtype").and_then(JsonValue::as_str))
            .ok_or_else(|| decode_error(schema, "missing 'subtype'".to_string()))?
            .to_string();
        let precision = match schema.get("precision").and_then(JsonValue::as_u64) {
            Some(p) => u16::try_from(p)
                .map_err(|_| decode_error(schema, format!("precision {p} is out of range")))?,
            None => default_precision(&subtype),
        };
        let units = schema
            .get("units")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            subtype,
            precision,
            units,
        })
    }
}

fn default_precision(subtype: &str) -> u16 {
    match subtype {
        "complex" => 128,
        _ => 64,
    }
}

fn decode_error(schema: &Map<String, JsonValue>, violation: String) -> CodecError {
    let type_name = schema
        .get("type")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    CodecError::decode(type_name, &JsonValue::Object(schema.clone()), violation)
}

fn scalar_bytes(scalar: &Scalar) -> Result<Vec<u8>> {
    let bytes = match (scalar.data, scalar.precision) {
        (ScalarData::Int(v), 8) => i8::try_from(v).ok().map(|v| v.to_le_bytes().to_vec()),
        (ScalarData::Int(v), 16) => i16::try_from(v).ok().map(|v| v.to_le_bytes().to_vec()),
        (ScalarData::Int(v), 32) => i32::try_from(v).ok().map(|v| v.to_le_bytes().to_vec()),
        (ScalarData::Int(v), 64) => Some(v.to_le_bytes().to_vec()),
        (ScalarData::Uint(v), 8) => u8::try_from(v).ok().map(|v| v.to_le_bytes().to_vec()),
        (ScalarData::Uint(v), 16) => u16::try_from(v).ok().map(|v| v.to_le_bytes().to_vec()),
        (ScalarData::Uint(v), 32) => u32::try_from(v).ok().map(|v| v.to_le_bytes().to_vec()),
        (ScalarData::Uint(v), 64) => Some(v.to_le_bytes().to_vec()),
        (ScalarData::Float(v), 32) => Some((v as f32).to_le_bytes().to_vec()),
        (ScalarData::Float(v), 64) => Some(v.to_le_bytes().to_vec()),
        (ScalarData::Complex(re, im), 64) => {
            Some([(re as f32).to_le_bytes(), (im as f32).to_le_bytes()].concat())
        }
        (ScalarData::Complex(re, im), 128) => Some([re.to_le_bytes(), im.to_le_bytes()].concat()),
        _ => None,
    };
    bytes.ok_or_else(|| {
        CodecError::encode(
            scalar.data.subtype(),
            scalar,
            format!("value does not fit precision {}", scalar.precision),
        )
    })
}

fn scalar_from_bytes(subtype: &str, precision: u16, data: &[u8]) -> Option<ScalarData> {
    let parsed = match (subtype, precision) {
        ("int", 8) => ScalarData::Int(i8::from_le_bytes(data.try_into().ok()?).into()),
        ("int", 16) => ScalarData::Int(i16::from_le_bytes(data.try_into().ok()?).into()),
        ("int", 32) => ScalarData::Int(i32::from_le_bytes(data.try_into().ok()?).into()),
        ("int", 64) => ScalarData::Int(i64::from_le_bytes(data.try_into().ok()?)),
        ("uint", 8) => ScalarData::Uint(u8::from_le_bytes(data.try_into().ok()?).into()),
        ("uint", 16) => ScalarData::Uint(u16::from_le_bytes(data.try_into().ok()?).into()),
        ("uint", 32) => ScalarData::Uint(u32::from_le_bytes(data.try_into().ok()?).into()),
        ("uint", 64) => ScalarData::Uint(u64::from_le_bytes(data.try_into().ok()?)),
        ("float", 32) => ScalarData::Float(f32::from_le_bytes(data.try_into().ok()?).into()),
        ("float", 64) => ScalarData::Float(f64::from_le_bytes(data.try_into().ok()?)),
        ("complex", 64) if data.len() == 8 => {
            let (re, im) = data.split_at(4);
            ScalarData::Complex(
                f32::from_le_bytes(re.try_into().ok()?).into(),
                f32::from_le_bytes(im.try_into().ok()?).into(),
            )
        }
        ("complex", 128) if data.len() == 16 => {
            let (re, im) = data.split_at(8);
            ScalarData::Complex(
                f64::from_le_bytes(re.try_into().ok()?),
                f64::from_le_bytes(im.try_into().ok()?),
            )
        }
        _ => return None,
    };
    Some(parsed)
}

fn finite(v: f64, value: &Value) -> Result<JsonValue> {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .ok_or_else(|| CodecError::encode("number", value, format!("{v} has no JSON representation")))
}

/// JSON form of a value nested inside a JSON payload.
fn wire_json(value: &Value) -> Result<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::from(*i),
        Value::Number(f) => finite(*f, value)?,
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Bytes(b) => JsonValue::String(base64::engine::general_purpose::STANDARD.encode(b)),
        Value::Scalar(s) => match s.data {
            ScalarData::Int(v) => JsonValue::from(v),
            ScalarData::Uint(v) => JsonValue::from(v),
            ScalarData::Float(v) => finite(v, value)?,
            ScalarData::Complex(re, im) => JsonValue::Array(vec![finite(re, value)?, finite(im, value)?]),
        },
        Value::Array(items) => JsonValue::Array(items.iter().map(wire_json).collect::<Result<_>>()?),
        Value::Object(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), wire_json(v)?)))
                .collect::<Result<_>>()?,
        ),
    })
}

fn from_wire_json(
    registry: &TypeRegistry,
    json: JsonValue,
    schema: &Map<String, JsonValue>,
) -> Result<Value> {
    let type_name = schema
        .get("type")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    let descriptor = registry.lookup(type_name)?;
    let class = descriptor.class();

    if class.is_binary() {
        return scalar_from_json(class, schema, json);
    }

    match (class, json) {
        (TypeClass::Null, JsonValue::Null) => Ok(Value::Null),
        (TypeClass::Boolean, JsonValue::Bool(b)) => Ok(Value::Boolean(b)),
        (TypeClass::Integer, JsonValue::Number(n)) if n.is_i64() => {
            Ok(Value::Integer(n.as_i64().unwrap_or_default()))
        }
        (TypeClass::Number, JsonValue::Number(n)) => Ok(Value::Number(n.as_f64().unwrap_or(f64::NAN))),
        (TypeClass::String, JsonValue::String(s)) => Ok(Value::String(s)),
        (TypeClass::Array, JsonValue::Array(items)) => {
            let spec = schema.get("items");
            if let Some(JsonValue::Array(list)) = spec {
                if list.len() != items.len() {
                    return Err(decode_error(
                        schema,
                        format!("expected {} items, found {}", list.len(), items.len()),
                    ));
                }
            }
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match spec.and_then(|spec| child_schema(spec, i)) {
                    Some(child) => from_wire_json(registry, item, child),
                    None => Ok(Value::from_json(&item)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        (TypeClass::Object, JsonValue::Object(entries)) => {
            let spec = schema.get("properties").and_then(JsonValue::as_object);
            entries
                .into_iter()
                .map(|(key, entry)| {
                    let value = match spec.and_then(|spec| spec.get(&key)).and_then(JsonValue::as_object) {
                        Some(child) => from_wire_json(registry, entry, child)?,
                        None => Value::from_json(&entry),
                    };
                    Ok((key, value))
                })
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Value::Object)
        }
        (_, json) => Err(decode_error(
            schema,
            format!("expected {type_name} data, found {json}"),
        )),
    }
}

fn scalar_from_json(class: &TypeClass, schema: &Map<String, JsonValue>, json: JsonValue) -> Result<Value> {
    let layout = ScalarLayout::from_schema(class, schema)?;
    let data = match (layout.subtype.as_str(), &json) {
        ("bytes", JsonValue::String(text)) => {
            return base64::engine::general_purpose::STANDARD
                .decode(text)
                .map(Value::Bytes)
                .map_err(|err| decode_error(schema, format!("invalid base64 bytes: {err}")));
        }
        ("int", JsonValue::Number(n)) => n.as_i64().map(ScalarData::Int),
        ("uint", JsonValue::Number(n)) => n.as_u64().map(ScalarData::Uint),
        ("float", JsonValue::Number(n)) => n.as_f64().map(ScalarData::Float),
        ("complex", JsonValue::Array(parts)) => match parts.as_slice() {
            [re, im] => re
                .as_f64()
                .zip(im.as_f64())
                .map(|(re, im)| ScalarData::Complex(re, im)),
            _ => None,
        },
        _ => None,
    };
    let data = data.ok_or_else(|| {
        decode_error(schema, format!("expected {} data, found {json}", layout.subtype))
    })?;
    Ok(Value::Scalar(Scalar {
        data,
        precision: layout.precision,
        units: layout.units,
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn scalar_binary_layout_is_little_endian() {
        let registry = TypeRegistry::with_builtins();
        let metadata = map(json!({"type": "int", "precision": 16, "units": ""}));
        let value = Value::Scalar(Scalar::int(-2, 16));

        let bytes = encode_data(&registry, &value, &metadata).unwrap();
        assert_eq!(bytes, vec![0xfe, 0xff]);
        assert_eq!(decode_data(&registry, &bytes, &metadata).unwrap(), value);
    }

    #[test]
    fn float32_payload_is_four_bytes() {
        let registry = TypeRegistry::with_builtins();
        let metadata = map(json!({"type": "scalar", "subtype": "float", "precision": 32, "units": "cm"}));
        let value = Value::Scalar(Scalar::float(2.5, 32).with_units("cm"));

        let bytes = encode_data(&registry, &value, &metadata).unwrap();
        assert_eq!(bytes, 2.5f32.to_le_bytes().to_vec());
        assert_eq!(decode_data(&registry, &bytes, &metadata).unwrap(), value);
    }

    #[test]
    fn overflowing_precision_fails() {
        let registry = TypeRegistry::with_builtins();
        let metadata = map(json!({"type": "uint", "precision": 8, "units": ""}));
        assert!(encode_data(&registry, &Value::Scalar(Scalar::uint(300, 8)), &metadata).is_err());
    }

    #[test]
    fn wrong_length_payload_fails() {
        let registry = TypeRegistry::with_builtins();
        let metadata = map(json!({"type": "float", "precision": 64, "units": ""}));
        assert!(matches!(
            decode_data(&registry, &[0, 0, 0], &metadata),
            Err(CodecError::Decode { .. })
        ));
    }

    #[test]
    fn nested_values_use_json_layout() {
        let registry = TypeRegistry::with_builtins();
        let metadata = map(json!({
            "type": "array",
            "items": [
                {"type": "complex", "precision": 128, "units": ""},
                {"type": "bytes", "precision": 16, "units": ""},
                {"type": "string"}
            ]
        }));
        let value = Value::Array(vec![
            Value::Scalar(Scalar::complex(1.5, -2.0, 128)),
            Value::Bytes(vec![0, 255]),
            Value::from("hi"),
        ]);

        let bytes = encode_data(&registry, &value, &metadata).unwrap();
        assert_eq!(
            serde_json::from_slice::<JsonValue>(&bytes).unwrap(),
            json!([[1.5, -2.0], "AP8=", "hi"])
        );
        assert_eq!(decode_data(&registry, &bytes, &metadata).unwrap(), value);
    }

    #[test]
    fn json_shape_mismatch_fails() {
        let registry = TypeRegistry::with_builtins();
        let metadata = map(json!({"type": "array", "items": [{"type": "integer"}]}));
        assert!(decode_data(&registry, b"[1, 2]", &metadata).is_err());
        assert!(decode_data(&registry, b"{\"a\": 1}", &metadata).is_err());
        assert!(decode_data(&registry, b"[1.5]", &metadata).is_err());
    }
}
