use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use serde_json::Value as JsonValue;

use crate::error::{CodecError, Result};

/// Largest integer magnitude an `f64` represents exactly.
pub(crate) const F64_EXACT_INT: u64 = 1 << 53;

/// Numeric payload of a [`Scalar`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarData {
    Int(i64),
    Uint(u64),
    Float(f64),
    Complex(f64, f64),
}

impl ScalarData {
    /// Subtype name used in type definitions (`int`, `uint`, `float`, `complex`).
    pub fn subtype(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Complex(..) => "complex",
        }
    }

    /// Default precision in bits for this subtype.
    pub fn default_precision(&self) -> u16 {
        match self {
            Self::Complex(..) => 128,
            _ => 64,
        }
    }

    /// Whether the data can be stored at `precision` bits without loss.
    pub fn fits(&self, precision: u16) -> bool {
        match *self {
            Self::Int(v) => match precision {
                8 => i8::try_from(v).is_ok(),
                16 => i16::try_from(v).is_ok(),
                32 => i32::try_from(v).is_ok(),
                64 => true,
                _ => false,
            },
            Self::Uint(v) => match precision {
                8 => u8::try_from(v).is_ok(),
                16 => u16::try_from(v).is_ok(),
                32 => u32::try_from(v).is_ok(),
                64 => true,
                _ => false,
            },
            Self::Float(v) => match precision {
                32 => f32_exact(v),
                64 => true,
                _ => false,
            },
            Self::Complex(re, im) => match precision {
                64 => f32_exact(re) && f32_exact(im),
                128 => true,
                _ => false,
            },
        }
    }
}

fn f32_exact(v: f64) -> bool {
    v.is_nan() || f64::from(v as f32) == v
}

/// A numeric value with an on-wire precision and attached units.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub data: ScalarData,
    /// Width in bits used when the value is laid out in binary.
    pub precision: u16,
    /// Unit expression; empty means dimensionless.
    pub units: String,
}

impl Scalar {
    /// Scalar at the subtype's default precision, without units.
    pub fn new(data: ScalarData) -> Self {
        Self {
            precision: data.default_precision(),
            data,
            units: String::new(),
        }
    }

    pub fn int(value: i64, precision: u16) -> Self {
        Self::new(ScalarData::Int(value)).with_precision(precision)
    }

    pub fn uint(value: u64, precision: u16) -> Self {
        Self::new(ScalarData::Uint(value)).with_precision(precision)
    }

    pub fn float(value: f64, precision: u16) -> Self {
        Self::new(ScalarData::Float(value)).with_precision(precision)
    }

    pub fn complex(re: f64, im: f64, precision: u16) -> Self {
        Self::new(ScalarData::Complex(re, im)).with_precision(precision)
    }

    pub fn with_precision(mut self, precision: u16) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    /// Real part as `f64`, when meaningful.
    pub fn as_f64(&self) -> Option<f64> {
        match self.data {
            ScalarData::Int(v) => Some(v as f64),
            ScalarData::Uint(v) => Some(v as f64),
            ScalarData::Float(v) => Some(v),
            ScalarData::Complex(..) => None,
        }
    }
}

/// The kind of a [`Value`], used by type descriptors to declare which
/// values they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Bytes,
    Int,
    Uint,
    Float,
    Complex,
    Array,
    Object,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Complex => "complex",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded, typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Bytes(Vec<u8>),
    Scalar(Scalar),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Scalar(s) => match s.data {
                ScalarData::Int(_) => ValueKind::Int,
                ScalarData::Uint(_) => ValueKind::Uint,
                ScalarData::Float(_) => ValueKind::Float,
                ScalarData::Complex(..) => ValueKind::Complex,
            },
            Self::Array(_) => ValueKind::Array,
            Self::Object(_) => ValueKind::Object,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Assign an array element.
    ///
    /// `index < len` overwrites in place and `index == len` appends. Any larger
    /// index is an error; containers are never padded.
    pub fn set_item(&mut self, index: usize, value: Value) -> Result<()> {
        let Self::Array(items) = self else {
            return Err(CodecError::encode(
                "array",
                self,
                format!("cannot assign index {index} on a {} value", self.kind()),
            ));
        };
        let len = items.len();
        match index.cmp(&len) {
            std::cmp::Ordering::Less => items[index] = value,
            std::cmp::Ordering::Equal => items.push(value),
            std::cmp::Ordering::Greater => return Err(CodecError::OutOfBounds { index, len }),
        }
        Ok(())
    }

    /// Assign an object property, inserting or overwriting.
    pub fn set_property(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        let Self::Object(map) = self else {
            return Err(CodecError::encode(
                "object",
                self,
                format!("cannot assign a property on a {} value", self.kind()),
            ));
        };
        map.insert(key.into(), value);
        Ok(())
    }

    /// Build a value from plain JSON.
    ///
    /// Integers that fit `i64` become [`Value::Integer`], larger unsigned
    /// integers become 64-bit `uint` scalars, other numbers become
    /// [`Value::Number`].
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Boolean(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Self::Scalar(Scalar::uint(u, 64))
                } else {
                    Self::Number(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Self::String(s.clone()),
            JsonValue::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Human-oriented JSON view of the value.
    ///
    /// Scalars with units render as `{"value": .., "units": ..}`, complex
    /// numbers as `[re, im]` and bytes as base64 strings. Non-finite floats
    /// render as `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::Integer(i) => JsonValue::from(*i),
            Self::Number(f) => float_json(*f),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Bytes(b) => JsonValue::String(base64::engine::general_purpose::STANDARD.encode(b)),
            Self::Scalar(s) => {
                let data = match s.data {
                    ScalarData::Int(v) => JsonValue::from(v),
                    ScalarData::Uint(v) => JsonValue::from(v),
                    ScalarData::Float(v) => float_json(v),
                    ScalarData::Complex(re, im) => {
                        JsonValue::Array(vec![float_json(re), float_json(im)])
                    }
                };
                if s.units.is_empty() {
                    data
                } else {
                    serde_json::json!({ "value": data, "units": s.units })
                }
            }
            Self::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => JsonValue::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

fn float_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Self::Scalar(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_item_appends_overwrites_and_rejects_gaps() {
        let mut arr = Value::Array(vec![Value::Integer(1)]);

        arr.set_item(1, Value::Integer(2)).unwrap();
        arr.set_item(0, Value::Integer(10)).unwrap();
        assert_eq!(
            arr,
            Value::Array(vec![Value::Integer(10), Value::Integer(2)])
        );

        let err = arr.set_item(3, Value::Integer(4)).unwrap_err();
        assert!(matches!(err, CodecError::OutOfBounds { index: 3, len: 2 }));
        assert_eq!(arr.as_array().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn set_item_on_non_array_fails() {
        let mut v = Value::Integer(1);
        assert!(v.set_item(0, Value::Null).is_err());
    }

    #[test]
    fn set_property_inserts() {
        let mut obj = Value::Object(BTreeMap::new());
        obj.set_property("a", Value::Boolean(true)).unwrap();
        obj.set_property("a", Value::Boolean(false)).unwrap();
        assert_eq!(obj.as_object().unwrap().get("a"), Some(&Value::Boolean(false)));
    }

    #[test]
    fn precision_fit_checks_are_lossless() {
        assert!(ScalarData::Int(127).fits(8));
        assert!(!ScalarData::Int(128).fits(8));
        assert!(ScalarData::Uint(u32::MAX as u64).fits(32));
        assert!(ScalarData::Float(2.5).fits(32));
        assert!(!ScalarData::Float(0.1).fits(32));
        assert!(!ScalarData::Float(1.0).fits(16));
        assert!(ScalarData::Complex(1.5, -0.5).fits(64));
    }

    #[test]
    fn json_conversion() {
        let json = serde_json::json!({"a": [1, 2.5, "x", null, true], "big": u64::MAX});
        let value = Value::from_json(&json);
        let obj = value.as_object().unwrap();
        assert_eq!(
            obj["a"],
            Value::Array(vec![
                Value::Integer(1),
                Value::Number(2.5),
                Value::String("x".into()),
                Value::Null,
                Value::Boolean(true),
            ])
        );
        assert_eq!(obj["big"], Value::Scalar(Scalar::uint(u64::MAX, 64)));
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn scalar_with_units_renders_value_and_units() {
        let v = Value::Scalar(Scalar::float(2.5, 32).with_units("cm"));
        assert_eq!(
            v.to_json(),
            serde_json::json!({"value": 2.5, "units": "cm"})
        );
    }
}
