use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::config::{CodecConfig, DecodeFallback};
use crate::convert;
use crate::data::{child_schema, decode_data, encode_data};
use crate::descriptor::TypeClass;
use crate::error::{CodecError, Result};
use crate::registry::TypeRegistry;
use crate::typedef::{Metadata, Typedef};
use crate::units;
use crate::validate::{compare_schema, validate_definition, validate_instance, validate_metadata};
use crate::value::Value;

/// Encodes values to `(metadata, payload)` pairs and back, driven by a
/// type registry.
///
/// The codec holds no per-call state and can be shared between threads.
#[derive(Debug, Clone)]
pub struct Codec {
    registry: Arc<TypeRegistry>,
    config: CodecConfig,
}

impl Codec {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(registry, CodecConfig::default())
    }

    pub fn with_config(registry: Arc<TypeRegistry>, config: CodecConfig) -> Self {
        Self { registry, config }
    }

    /// Codec over the process-wide registry.
    pub fn global() -> Self {
        Self::new(TypeRegistry::global())
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode `value`, inferring its type when no typedef is given.
    pub fn encode(&self, value: &Value, typedef: Option<&Typedef>) -> Result<(Metadata, Vec<u8>)> {
        let typedef = match typedef {
            Some(typedef) => {
                validate_definition(&self.registry, typedef)?;
                typedef.clone()
            }
            None => Typedef::new(self.registry.infer(value)?.name()),
        };

        let value = self.coerce(value.clone(), &typedef)?;
        let violations = validate_instance(&self.registry, &value, &typedef);
        if !violations.is_empty() {
            return Err(CodecError::Encode {
                type_name: typedef.type_name().to_string(),
                value: format!("{value:?}"),
                violations: violations.iter().map(ToString::to_string).collect(),
            });
        }

        let value = self.transform(value, &typedef)?;
        let metadata = self.encode_type(&value, Some(&typedef))?;
        let data = encode_data(&self.registry, &value, metadata.as_map())?;
        debug!(type_name = typedef.type_name(), size = data.len(), "encoded value");
        Ok((metadata, data))
    }

    /// Convert a near-compatible value into the kind `typedef` expects.
    /// Only lossless conversions are applied.
    pub fn coerce(&self, value: Value, typedef: &Typedef) -> Result<Value> {
        convert::coerce(&self.registry, value, typedef.as_map())
    }

    /// Apply `typedef`'s precision and units to a value.
    pub fn transform(&self, value: Value, typedef: &Typedef) -> Result<Value> {
        convert::transform(&self.registry, value, typedef.as_map())
    }

    /// Derive the metadata describing `value`.
    ///
    /// Keys of an explicit typedef are carried over; a key whose explicit
    /// value differs from the derived one is an error.
    pub fn encode_type(&self, value: &Value, typedef: Option<&Typedef>) -> Result<Metadata> {
        self.derive(value, typedef.map(Typedef::as_map))
            .map(Metadata::from_map)
    }

    fn derive(&self, value: &Value, schema: Option<&Map<String, JsonValue>>) -> Result<Map<String, JsonValue>> {
        let descriptor = match schema.and_then(|s| s.get("type")).and_then(JsonValue::as_str) {
            Some(name) => self.registry.lookup(name)?,
            None => self.registry.infer(value)?,
        };
        let type_name = descriptor.name();
        let class = descriptor.class();

        let mut derived = Map::new();
        derived.insert("type".to_string(), JsonValue::from(type_name));
        match value {
            Value::Scalar(scalar) if class.is_binary() => {
                if matches!(class, TypeClass::Scalar) {
                    derived.insert("subtype".to_string(), JsonValue::from(scalar.data.subtype()));
                }
                derived.insert("precision".to_string(), JsonValue::from(scalar.precision));
                derived.insert("units".to_string(), JsonValue::from(scalar.units.as_str()));
            }
            Value::Bytes(bytes) if class.is_binary() => {
                if matches!(class, TypeClass::Scalar) {
                    derived.insert("subtype".to_string(), JsonValue::from("bytes"));
                }
                derived.insert("precision".to_string(), JsonValue::from(bytes.len() * 8));
                derived.insert("units".to_string(), JsonValue::from(""));
            }
            Value::Array(items) if matches!(class, TypeClass::Array) => {
                let spec = schema.and_then(|s| s.get("items"));
                let children = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        self.derive(item, spec.and_then(|spec| child_schema(spec, i)))
                            .map(JsonValue::Object)
                    })
                    .collect::<Result<Vec<_>>>()?;
                derived.insert("items".to_string(), JsonValue::Array(children));
            }
            Value::Object(entries) if matches!(class, TypeClass::Object) => {
                let spec = schema
                    .and_then(|s| s.get("properties"))
                    .and_then(JsonValue::as_object);
                let children = entries
                    .iter()
                    .map(|(key, entry)| {
                        let child = spec.and_then(|spec| spec.get(key)).and_then(JsonValue::as_object);
                        Ok((key.clone(), JsonValue::Object(self.derive(entry, child)?)))
                    })
                    .collect::<Result<Map<_, _>>>()?;
                derived.insert("properties".to_string(), JsonValue::Object(children));
            }
            _ => {}
        }

        let Some(schema) = schema else {
            return Ok(derived);
        };
        for (key, explicit) in schema {
            if key == "items" || key == "properties" {
                continue;
            }
            match derived.get(key) {
                None => {
                    derived.insert(key.clone(), explicit.clone());
                }
                Some(found) if found == explicit => {}
                Some(_) if key == "units" && explicit.as_str().is_some_and(units::is_dimensionless) => {}
                Some(found) => {
                    return Err(CodecError::encode(
                        type_name,
                        value,
                        format!("explicit '{key}' = {explicit} conflicts with derived {found}"),
                    ));
                }
            }
        }
        Ok(derived)
    }

    /// Diagnostics explaining why `metadata` cannot be decoded as `typedef`.
    ///
    /// An empty list means the data can be decoded directly. An invalid
    /// typedef or unknown metadata type is an error rather than a diagnostic.
    pub fn check_encoded(&self, metadata: &Metadata, typedef: Option<&Typedef>) -> Result<Vec<String>> {
        let type_name = metadata.type_name().ok_or_else(|| {
            CodecError::decode("", metadata, "metadata is missing 'type'".to_string())
        })?;
        let descriptor = self.registry.lookup(type_name)?;

        let mut diagnostics = Vec::new();
        if let Err(err) = validate_metadata(&self.registry, descriptor, metadata) {
            diagnostics.extend(err.violations().iter().cloned());
        }
        if let Some(typedef) = typedef {
            validate_definition(&self.registry, typedef)?;
            let found = self.registry.to_base(metadata.as_map());
            let expected = self.registry.to_base(typedef.as_map());
            diagnostics.extend(compare_schema(&found, &expected));
        }
        Ok(diagnostics)
    }

    /// Decode a payload described by `metadata`, optionally as `typedef`.
    ///
    /// When the metadata does not satisfy `typedef`, the configured fallbacks
    /// are tried in order before failing with the original diagnostics.
    pub fn decode(&self, metadata: &Metadata, data: &[u8], typedef: Option<&Typedef>) -> Result<Value> {
        let diagnostics = self.check_encoded(metadata, typedef)?;
        if diagnostics.is_empty() {
            let value = decode_data(&self.registry, data, metadata.as_map())?;
            return match typedef {
                Some(typedef) => self.transform(value, typedef),
                None => Ok(value),
            };
        }

        if let Some(typedef) = typedef {
            for fallback in &self.config.fallbacks {
                let recovered = match fallback {
                    DecodeFallback::UnwrapSingleElement => self.unwrap_single(metadata, data, typedef)?,
                    DecodeFallback::Conversion => self.convert(metadata, data, typedef)?,
                };
                if let Some(value) = recovered {
                    debug!(?fallback, to = typedef.type_name(), "decoded through fallback");
                    return Ok(value);
                }
            }
        }

        Err(CodecError::Decode {
            type_name: metadata.type_name().unwrap_or_default().to_string(),
            metadata: metadata.to_string(),
            violations: diagnostics,
        })
    }

    fn unwrap_single(&self, metadata: &Metadata, data: &[u8], typedef: &Typedef) -> Result<Option<Value>> {
        let Some(descriptor) = metadata.type_name().and_then(|name| self.registry.get(name)) else {
            return Ok(None);
        };
        if !matches!(descriptor.class(), TypeClass::Array) {
            return Ok(None);
        }
        let item = match metadata.get("items") {
            Some(JsonValue::Array(items)) if items.len() == 1 => match items[0].as_object() {
                Some(item) => item,
                None => return Ok(None),
            },
            _ => return Ok(None),
        };

        let found = self.registry.to_base(item);
        let expected = self.registry.to_base(typedef.as_map());
        if compare_schema(&found, &expected).next().is_some() {
            return Ok(None);
        }

        match decode_data(&self.registry, data, metadata.as_map())? {
            Value::Array(mut items) if items.len() == 1 => {
                let item = items.remove(0);
                self.transform(item, typedef).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn convert(&self, metadata: &Metadata, data: &[u8], typedef: &Typedef) -> Result<Option<Value>> {
        let expected = self.registry.to_base(typedef.as_map());
        let from = self.registry.effective_type_name(metadata.as_map());
        let to = self.registry.effective_type_name(&expected);
        let Some(conversion) = self.registry.conversion(from, to) else {
            return Ok(None);
        };
        let Some(descriptor) = metadata.type_name().and_then(|name| self.registry.get(name)) else {
            return Ok(None);
        };
        if validate_metadata(&self.registry, descriptor, metadata).is_err() {
            return Ok(None);
        }

        let decoded = decode_data(&self.registry, data, metadata.as_map())?;
        let converted = conversion(decoded).ok_or_else(|| {
            CodecError::decode(
                to,
                metadata,
                format!("value cannot be converted losslessly from '{from}' to '{to}'"),
            )
        })?;
        let converted = self.coerce(converted, typedef)?;
        let violations = validate_instance(&self.registry, &converted, typedef);
        if !violations.is_empty() {
            return Err(CodecError::Decode {
                type_name: typedef.type_name().to_string(),
                metadata: metadata.to_string(),
                violations: violations.iter().map(ToString::to_string).collect(),
            });
        }
        self.transform(converted, typedef).map(Some)
    }

    /// The value an empty payload of this metadata's type stands for.
    pub fn empty_value(&self, metadata: &Metadata) -> Value {
        let Some(descriptor) = metadata.type_name().and_then(|name| self.registry.get(name)) else {
            return Value::Null;
        };
        let class = descriptor.class();
        match class {
            TypeClass::String => Value::String(String::new()),
            TypeClass::Array => Value::Array(Vec::new()),
            TypeClass::Object => Value::Object(BTreeMap::new()),
            class if class.is_binary() => {
                let subtype = class
                    .fixed_subtype()
                    .or_else(|| metadata.get("subtype").and_then(JsonValue::as_str));
                if subtype == Some("bytes") {
                    Value::Bytes(Vec::new())
                } else {
                    Value::Null
                }
            }
            _ => Value::Null,
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::global()
    }
}
