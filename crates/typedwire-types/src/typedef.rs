use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{CodecError, Result};

/// Keys added to metadata by the framing layer rather than by encoding.
pub const TRANSPORT_KEYS: [&str; 5] = ["size", "id", "incomplete", "raw", "eof"];

/// A type definition: a `type` name plus the property values that constrain it.
///
/// The `type` key is fixed once set. Use [`Typedef::set`] for mutation; it
/// rejects attempts to change the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, JsonValue>", into = "Map<String, JsonValue>")]
pub struct Typedef(Map<String, JsonValue>);

impl Typedef {
    pub fn new(type_name: &str) -> Self {
        let mut map = Map::new();
        map.insert("type".to_string(), JsonValue::String(type_name.to_string()));
        Self(map)
    }

    /// Build a typedef from a JSON object, which must carry a string `type`.
    pub fn from_map(map: Map<String, JsonValue>) -> Result<Self> {
        match map.get("type") {
            Some(JsonValue::String(_)) => Ok(Self(map)),
            Some(other) => Err(CodecError::Schema {
                type_name: other.to_string(),
                violations: vec!["'type' must be a string".to_string()],
            }),
            None => Err(CodecError::Schema {
                type_name: String::new(),
                violations: vec!["type definition is missing 'type'".to_string()],
            }),
        }
    }

    pub fn from_json(json: JsonValue) -> Result<Self> {
        match json {
            JsonValue::Object(map) => Self::from_map(map),
            JsonValue::String(name) => Ok(Self::new(&name)),
            other => Err(CodecError::Schema {
                type_name: String::new(),
                violations: vec![format!("type definition must be an object, got {other}")],
            }),
        }
    }

    pub fn type_name(&self) -> &str {
        self.0.get("type").and_then(JsonValue::as_str).unwrap_or_default()
    }

    /// Set a property. Changing `type` to a different name fails.
    pub fn set(&mut self, key: &str, value: impl Into<JsonValue>) -> Result<()> {
        let value = value.into();
        if key == "type" {
            let to = value.as_str().unwrap_or_default();
            if to != self.type_name() {
                return Err(CodecError::TypeChange {
                    from: self.type_name().to_string(),
                    to: value.to_string(),
                });
            }
        }
        self.0.insert(key.to_string(), value);
        Ok(())
    }

    /// Builder form of [`Typedef::set`].
    pub fn with(mut self, key: &str, value: impl Into<JsonValue>) -> Result<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    pub fn precision(&self) -> Option<u64> {
        self.0.get("precision").and_then(JsonValue::as_u64)
    }

    pub fn units(&self) -> Option<&str> {
        self.0.get("units").and_then(JsonValue::as_str)
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, JsonValue> {
        self.0
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.0.clone())
    }
}

impl Deref for Typedef {
    type Target = Map<String, JsonValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<Map<String, JsonValue>> for Typedef {
    type Error = CodecError;

    fn try_from(map: Map<String, JsonValue>) -> Result<Self> {
        Self::from_map(map)
    }
}

impl From<Typedef> for Map<String, JsonValue> {
    fn from(typedef: Typedef) -> Self {
        typedef.0
    }
}

impl fmt::Display for Typedef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", JsonValue::Object(self.0.clone()))
    }
}

/// Description of one encoded value, as carried in a message header.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, JsonValue>);

impl Metadata {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, JsonValue>) -> Self {
        Self(map)
    }

    /// Parse metadata from a JSON object.
    pub fn from_json(json: JsonValue) -> Result<Self> {
        match json {
            JsonValue::Object(map) => Ok(Self(map)),
            other => Err(CodecError::Schema {
                type_name: String::new(),
                violations: vec![format!("metadata must be an object, got {other}")],
            }),
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        self.0.get("type").and_then(JsonValue::as_str)
    }

    /// Declared payload size in bytes.
    pub fn size(&self) -> Option<u64> {
        self.0.get("size").and_then(JsonValue::as_u64)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(JsonValue::as_str)
    }

    pub fn incomplete(&self) -> bool {
        self.flag("incomplete")
    }

    pub fn is_raw(&self) -> bool {
        self.flag("raw")
    }

    pub fn is_eof(&self) -> bool {
        self.flag("eof")
    }

    fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(JsonValue::as_bool).unwrap_or(false)
    }

    /// Minimal type definition describing the encoded value, with transport
    /// bookkeeping removed.
    pub fn extract_typedef(&self) -> Result<Typedef> {
        let mut map = self.0.clone();
        for key in TRANSPORT_KEYS {
            map.remove(key);
        }
        Typedef::from_map(map)
    }

    pub fn as_map(&self) -> &Map<String, JsonValue> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, JsonValue> {
        self.0
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.0.clone())
    }
}

impl Deref for Metadata {
    type Target = Map<String, JsonValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Metadata {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", JsonValue::Object(self.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn type_cannot_change() {
        let mut typedef = Typedef::new("scalar");
        typedef.set("type", "scalar").unwrap();
        typedef.set("precision", 32).unwrap();

        let err = typedef.set("type", "array").unwrap_err();
        assert!(matches!(err, CodecError::TypeChange { ref from, .. } if from == "scalar"));
        assert_eq!(typedef.type_name(), "scalar");
        assert_eq!(typedef.precision(), Some(32));
    }

    #[test]
    fn from_json_requires_type() {
        assert!(Typedef::from_json(json!({"precision": 32})).is_err());
        assert!(Typedef::from_json(json!({"type": 5})).is_err());
        assert!(Typedef::from_json(json!([1])).is_err());
        assert_eq!(Typedef::from_json(json!("float")).unwrap().type_name(), "float");
    }

    #[test]
    fn deserialize_rejects_missing_type() {
        assert!(serde_json::from_str::<Typedef>(r#"{"units":"m"}"#).is_err());
        let typedef: Typedef = serde_json::from_str(r#"{"type":"int","units":"m"}"#).unwrap();
        assert_eq!(typedef.units(), Some("m"));
    }

    #[test]
    fn metadata_flags_and_extraction() {
        let metadata = Metadata::from_json(json!({
            "type": "float",
            "precision": 64,
            "units": "s",
            "size": 8,
            "id": "abc",
            "incomplete": false,
            "raw": true
        }))
        .unwrap();

        assert_eq!(metadata.size(), Some(8));
        assert_eq!(metadata.id(), Some("abc"));
        assert!(!metadata.incomplete());
        assert!(metadata.is_raw());
        assert!(!metadata.is_eof());

        let typedef = metadata.extract_typedef().unwrap();
        assert_eq!(
            typedef.to_json(),
            json!({"type": "float", "precision": 64, "units": "s"})
        );
    }
}
