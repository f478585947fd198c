//! Value coercion and type-directed transforms.
//!
//! `coerce` runs before validation and only performs lossless conversions;
//! anything it cannot convert exactly is left alone for validation to
//! report. `transform` runs after validation and applies the typedef's
//! precision and units to scalars.

use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue};

use crate::data::child_schema;
use crate::descriptor::TypeClass;
use crate::error::{CodecError, Result};
use crate::registry::TypeRegistry;
use crate::units;
use crate::value::{Scalar, ScalarData, Value, F64_EXACT_INT};

const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
const U64_BOUND: f64 = 18_446_744_073_709_551_616.0;

struct ScalarTarget<'a> {
    subtype: Option<&'a str>,
    precision: Option<u16>,
    units: Option<&'a str>,
}

impl<'a> ScalarTarget<'a> {
    fn new(class: &'a TypeClass, schema: &'a Map<String, JsonValue>) -> Self {
        Self {
            subtype: class
                .fixed_subtype()
                .or_else(|| schema.get("subtype").and_then(JsonValue::as_str)),
            precision: schema
                .get("precision")
                .and_then(JsonValue::as_u64)
                .and_then(|p| u16::try_from(p).ok()),
            units: schema.get("units").and_then(JsonValue::as_str),
        }
    }
}

pub(crate) fn coerce(
    registry: &TypeRegistry,
    value: Value,
    schema: &Map<String, JsonValue>,
) -> Result<Value> {
    let type_name = schema.get("type").and_then(JsonValue::as_str).unwrap_or_default();
    let Some(descriptor) = registry.get(type_name) else {
        return Ok(value);
    };
    let class = descriptor.class();

    Ok(match (class, value) {
        (class, value) if class.is_binary() => coerce_scalar(value, &ScalarTarget::new(class, schema)),
        (TypeClass::Number, Value::Integer(i)) if i.unsigned_abs() <= F64_EXACT_INT => {
            Value::Number(i as f64)
        }
        (TypeClass::Number, Value::Scalar(Scalar { data: ScalarData::Float(f), units: unit, .. }))
            if units::is_dimensionless(&unit) =>
        {
            Value::Number(f)
        }
        (TypeClass::Integer, Value::Number(f)) if is_integral(f, I64_BOUND) => Value::Integer(f as i64),
        (TypeClass::Integer, Value::Scalar(Scalar { data, units: unit, precision }))
            if units::is_dimensionless(&unit) =>
        {
            match retype(data, "int") {
                Some(ScalarData::Int(i)) => Value::Integer(i),
                _ => Value::Scalar(Scalar { data, precision, units: unit }),
            }
        }
        (TypeClass::String, Value::Bytes(bytes)) => match String::from_utf8(bytes) {
            Ok(text) => Value::String(text),
            Err(err) => Value::Bytes(err.into_bytes()),
        },
        (TypeClass::Array | TypeClass::Object, value) => {
            return map_children(value, schema, |child, child_schema| {
                coerce(registry, child, child_schema)
            });
        }
        (_, value) => value,
    })
}

fn coerce_scalar(value: Value, target: &ScalarTarget<'_>) -> Value {
    let mut scalar = match value {
        Value::String(text) if target.subtype == Some("bytes") => return Value::Bytes(text.into_bytes()),
        Value::Integer(i) => match retype(ScalarData::Int(i), target.subtype.unwrap_or("int")) {
            Some(data) => Scalar::new(data),
            None => return value,
        },
        Value::Number(f) => match retype(ScalarData::Float(f), target.subtype.unwrap_or("float")) {
            Some(data) => Scalar::new(data),
            None => return value,
        },
        Value::Scalar(scalar) => {
            let subtype = target.subtype.unwrap_or(scalar.data.subtype());
            match retype(scalar.data, subtype) {
                Some(data) if data.subtype() == scalar.data.subtype() => scalar,
                Some(data) => Scalar::new(data).with_units(scalar.units),
                None => return Value::Scalar(scalar),
            }
        }
        other => return other,
    };

    if let Some(precision) = target.precision {
        if precision != scalar.precision && scalar.data.fits(precision) {
            scalar.precision = precision;
        }
    }
    Value::Scalar(scalar)
}

/// Re-express scalar data as another subtype, only when exact.
fn retype(data: ScalarData, subtype: &str) -> Option<ScalarData> {
    use ScalarData::*;

    if data.subtype() == subtype {
        return Some(data);
    }
    match (data, subtype) {
        (Int(i), "uint") => u64::try_from(i).ok().map(Uint),
        (Uint(u), "int") => i64::try_from(u).ok().map(Int),
        (Int(i), "float") if i.unsigned_abs() <= F64_EXACT_INT => Some(Float(i as f64)),
        (Uint(u), "float") if u <= F64_EXACT_INT => Some(Float(u as f64)),
        (Int(_) | Uint(_), "complex") => match retype(data, "float") {
            Some(Float(f)) => Some(Complex(f, 0.0)),
            _ => None,
        },
        (Float(f), "complex") => Some(Complex(f, 0.0)),
        (Float(f), "int") if is_integral(f, I64_BOUND) => Some(Int(f as i64)),
        (Float(f), "uint") if f >= 0.0 && is_integral(f, U64_BOUND) => Some(Uint(f as u64)),
        (Complex(re, im), "float") if im == 0.0 => Some(Float(re)),
        _ => None,
    }
}

fn is_integral(f: f64, bound: f64) -> bool {
    f.fract() == 0.0 && f >= -bound && f < bound
}

/// Apply a typedef's precision and units to a validated value.
///
/// Precision is only ever widened. Units are attached to unitless scalars
/// and converted otherwise; integer scalars must convert to whole numbers.
pub(crate) fn transform(
    registry: &TypeRegistry,
    value: Value,
    schema: &Map<String, JsonValue>,
) -> Result<Value> {
    let type_name = schema.get("type").and_then(JsonValue::as_str).unwrap_or_default();
    let Some(descriptor) = registry.get(type_name) else {
        return Ok(value);
    };
    let class = descriptor.class();

    match (class, value) {
        (class, Value::Scalar(mut scalar)) if class.is_binary() => {
            let target = ScalarTarget::new(class, schema);
            if let Some(precision) = target.precision {
                if precision > scalar.precision && scalar.data.fits(precision) {
                    scalar.precision = precision;
                }
            }
            match target.units {
                Some(to) if !units::is_dimensionless(to) => {
                    if units::is_dimensionless(&scalar.units) {
                        scalar.units = to.to_string();
                    } else if scalar.units != to {
                        scalar = convert_units(scalar, to)?;
                    }
                }
                _ => {}
            }
            Ok(Value::Scalar(scalar))
        }
        (TypeClass::Array | TypeClass::Object, value) => map_children(value, schema, |child, child_schema| {
            transform(registry, child, child_schema)
        }),
        (_, value) => Ok(value),
    }
}

fn convert_units(scalar: Scalar, to: &str) -> Result<Scalar> {
    let from = scalar.units.as_str();
    let convert = |v: f64| units::convert(v, from, to);
    let data = match scalar.data {
        ScalarData::Float(f) => ScalarData::Float(convert(f)?),
        ScalarData::Complex(re, im) => ScalarData::Complex(convert(re)?, convert(im)?),
        ScalarData::Int(i) => {
            let converted = convert(i as f64)?;
            if !is_integral(converted, I64_BOUND) {
                return Err(not_integral(i, from, to, converted));
            }
            ScalarData::Int(converted as i64)
        }
        ScalarData::Uint(u) => {
            let converted = convert(u as f64)?;
            if converted < 0.0 || !is_integral(converted, U64_BOUND) {
                return Err(not_integral(u, from, to, converted));
            }
            ScalarData::Uint(converted as u64)
        }
    };
    Ok(Scalar {
        data,
        precision: scalar.precision,
        units: to.to_string(),
    })
}

fn not_integral(value: impl std::fmt::Display, from: &str, to: &str, converted: f64) -> CodecError {
    CodecError::Units(format!(
        "{value} {from} is {converted} {to}, which is not a whole number"
    ))
}

/// Rebuild a container, passing each child with its schema through `f`.
/// Children without a schema are kept as is.
fn map_children<F>(value: Value, schema: &Map<String, JsonValue>, mut f: F) -> Result<Value>
where
    F: FnMut(Value, &Map<String, JsonValue>) -> Result<Value>,
{
    match value {
        Value::Array(items) => {
            let Some(spec) = schema.get("items") else {
                return Ok(Value::Array(items));
            };
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match child_schema(spec, i) {
                    Some(child) => f(item, child),
                    None => Ok(item),
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        Value::Object(entries) => {
            let Some(spec) = schema.get("properties").and_then(JsonValue::as_object) else {
                return Ok(Value::Object(entries));
            };
            entries
                .into_iter()
                .map(|(key, entry)| {
                    let entry = match spec.get(&key).and_then(JsonValue::as_object) {
                        Some(child) => f(entry, child)?,
                        None => entry,
                    };
                    Ok((key, entry))
                })
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Value::Object)
        }
        other => Ok(other),
    }
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
    fn coerce_json_numbers_into_scalars() {
        let registry = TypeRegistry::with_builtins();
        let schema = map(json!({"type": "scalar", "subtype": "float", "precision": 32}));

        assert_eq!(
            coerce(&registry, Value::Number(2.5), &schema).unwrap(),
            Value::Scalar(Scalar::float(2.5, 32))
        );
        assert_eq!(
            coerce(&registry, Value::Integer(3), &schema).unwrap(),
            Value::Scalar(Scalar::float(3.0, 32))
        );
        // 0.1 is not exact at 32 bits, so precision stays at 64.
        assert_eq!(
            coerce(&registry, Value::Number(0.1), &schema).unwrap(),
            Value::Scalar(Scalar::float(0.1, 64))
        );
    }

    #[test]
    fn coerce_never_narrows_lossily() {
        let registry = TypeRegistry::with_builtins();
        let int8 = map(json!({"type": "int", "precision": 8}));
        assert_eq!(
            coerce(&registry, Value::Integer(300), &int8).unwrap(),
            Value::Scalar(Scalar::int(300, 64))
        );
        assert_eq!(
            coerce(&registry, Value::Number(1.5), &int8).unwrap(),
            Value::Number(1.5)
        );

        let uint = map(json!({"type": "uint"}));
        assert_eq!(
            coerce(&registry, Value::Integer(-1), &uint).unwrap(),
            Value::Integer(-1)
        );
    }

    #[test]
    fn coerce_strings_and_bytes() {
        let registry = TypeRegistry::with_builtins();
        assert_eq!(
            coerce(&registry, Value::from("abc"), &map(json!({"type": "bytes"}))).unwrap(),
            Value::Bytes(b"abc".to_vec())
        );
        let string = map(json!({"type": "string"}));
        assert_eq!(
            coerce(&registry, Value::Bytes(b"abc".to_vec()), &string).unwrap(),
            Value::from("abc")
        );
        assert_eq!(
            coerce(&registry, Value::Bytes(vec![0xff]), &string).unwrap(),
            Value::Bytes(vec![0xff])
        );
    }

    #[test]
    fn coerce_recurses_into_containers() {
        let registry = TypeRegistry::with_builtins();
        let schema = map(json!({"type": "array", "items": {"type": "uint", "precision": 16}}));
        assert_eq!(
            coerce(&registry, Value::Array(vec![1i64.into(), 2i64.into()]), &schema).unwrap(),
            Value::Array(vec![
                Value::Scalar(Scalar::uint(1, 16)),
                Value::Scalar(Scalar::uint(2, 16)),
            ])
        );
    }

    #[test]
    fn transform_converts_units() {
        let registry = TypeRegistry::with_builtins();
        let schema = map(json!({"type": "scalar", "subtype": "float", "precision": 32, "units": "m"}));
        let value = Value::Scalar(Scalar::float(2.5, 32).with_units("cm"));

        let out = transform(&registry, value, &schema).unwrap();
        assert_eq!(out, Value::Scalar(Scalar::float(0.025, 32).with_units("m")));
    }

    #[test]
    fn transform_attaches_units_and_widens() {
        let registry = TypeRegistry::with_builtins();
        let schema = map(json!({"type": "int", "precision": 32, "units": "s"}));
        let out = transform(&registry, Value::Scalar(Scalar::int(5, 8)), &schema).unwrap();
        assert_eq!(out, Value::Scalar(Scalar::int(5, 32).with_units("s")));
    }

    #[test]
    fn transform_rejects_fractional_integer_conversion() {
        let registry = TypeRegistry::with_builtins();
        let schema = map(json!({"type": "int", "units": "m"}));
        let value = Value::Scalar(Scalar::int(5, 64).with_units("cm"));
        assert!(matches!(
            transform(&registry, value, &schema),
            Err(CodecError::Units(_))
        ));

        let value = Value::Scalar(Scalar::int(500, 64).with_units("cm"));
        assert_eq!(
            transform(&registry, value, &schema).unwrap(),
            Value::Scalar(Scalar::int(5, 64).with_units("m"))
        );
    }
}
