use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::descriptor::{builtin_descriptors, TypeClass, TypeDescriptor};
use crate::error::{CodecError, Result};
use crate::value::{Scalar, ScalarData, Value, F64_EXACT_INT};

/// Lossless conversion between two registered types, used as a decode
/// fallback. Returns `None` when the value cannot be converted exactly.
pub type Conversion = fn(Value) -> Option<Value>;

static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();

/// Name-keyed table of type descriptors plus the conversion table.
///
/// Registration takes `&mut self`; share the registry through `Arc` once it
/// is complete.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<TypeDescriptor>>,
    /// Descriptors by descending specificity, ties in registration order.
    ordered: Vec<Arc<TypeDescriptor>>,
    conversions: HashMap<(String, String), Conversion>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in types and conversions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin_descriptors() {
            registry.insert(Arc::new(descriptor));
        }
        registry.register_conversion("integer", "number", integer_to_number);
        registry.register_conversion("int", "float", int_to_float);
        registry.register_conversion("uint", "float", uint_to_float);
        registry.register_conversion("float", "complex", float_to_complex);
        registry
    }

    /// The process-wide registry.
    ///
    /// Returns the registry passed to [`TypeRegistry::install_global`], or
    /// the built-in registry if none was installed before first use.
    pub fn global() -> Arc<TypeRegistry> {
        GLOBAL
            .get_or_init(|| Arc::new(Self::with_builtins()))
            .clone()
    }

    /// Install the process-wide registry. Fails once the global registry has
    /// been installed or used.
    pub fn install_global(registry: TypeRegistry) -> Result<()> {
        GLOBAL
            .set(Arc::new(registry))
            .map_err(|_| CodecError::RegistryInstalled)
    }

    /// Register a descriptor.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<()> {
        if self.types.contains_key(descriptor.name()) && !descriptor.replaces_existing() {
            return Err(CodecError::DuplicateType(descriptor.name().to_string()));
        }
        debug!(
            type_name = descriptor.name(),
            specificity = descriptor.specificity(),
            "registering type"
        );
        self.insert(Arc::new(descriptor));
        Ok(())
    }

    fn insert(&mut self, descriptor: Arc<TypeDescriptor>) {
        let name = descriptor.name().to_string();
        if self.types.remove(&name).is_some() {
            self.ordered.retain(|existing| existing.name() != name);
        }
        let position = self
            .ordered
            .iter()
            .position(|existing| existing.specificity() < descriptor.specificity())
            .unwrap_or(self.ordered.len());
        self.ordered.insert(position, Arc::clone(&descriptor));
        self.types.insert(name, descriptor);
    }

    /// Look up a descriptor by name.
    pub fn lookup(&self, name: &str) -> Result<&Arc<TypeDescriptor>> {
        self.get(name)
            .ok_or_else(|| CodecError::UnknownType(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// The most specific type accepting `value`.
    pub fn infer(&self, value: &Value) -> Result<&Arc<TypeDescriptor>> {
        self.ordered
            .iter()
            .find(|descriptor| descriptor.accepts(value))
            .ok_or_else(|| CodecError::NoMatchingType(value.kind().to_string()))
    }

    /// Descriptors in inference order.
    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<TypeDescriptor>> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn register_conversion(&mut self, from: &str, to: &str, conversion: Conversion) {
        self.conversions
            .insert((from.to_string(), to.to_string()), conversion);
    }

    pub fn conversion(&self, from: &str, to: &str) -> Option<Conversion> {
        self.conversions
            .get(&(from.to_string(), to.to_string()))
            .copied()
    }

    /// Rewrite a schema whose type is a fixed subtype into its base form,
    /// recursing into container children.
    pub fn to_base(&self, schema: &Map<String, JsonValue>) -> Map<String, JsonValue> {
        let mut out = match self.class_of(schema) {
            Some(TypeClass::Fixed(fixed)) => fixed.to_base(schema),
            _ => schema.clone(),
        };
        match out.get_mut("items") {
            Some(JsonValue::Object(child)) => *child = self.to_base(child),
            Some(JsonValue::Array(children)) => {
                for child in children {
                    if let JsonValue::Object(child) = child {
                        *child = self.to_base(child);
                    }
                }
            }
            _ => {}
        }
        if let Some(JsonValue::Object(children)) = out.get_mut("properties") {
            for child in children.values_mut() {
                if let JsonValue::Object(child) = child {
                    *child = self.to_base(child);
                }
            }
        }
        out
    }

    /// Name of the fixed subtype that a base-form schema reduces to, or the
    /// schema's own type name.
    pub fn effective_type_name<'a>(&'a self, schema: &'a Map<String, JsonValue>) -> &'a str {
        let name = schema
            .get("type")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        self.ordered
            .iter()
            .find_map(|descriptor| match descriptor.class() {
                TypeClass::Fixed(fixed) if fixed.base == name && fixed.matches(schema) => {
                    Some(descriptor.name())
                }
                _ => None,
            })
            .unwrap_or(name)
    }

    fn class_of(&self, schema: &Map<String, JsonValue>) -> Option<&TypeClass> {
        let name = schema.get("type").and_then(JsonValue::as_str)?;
        self.get(name).map(|descriptor| descriptor.class())
    }
}

fn integer_to_number(value: Value) -> Option<Value> {
    match value {
        Value::Integer(i) if i.unsigned_abs() <= F64_EXACT_INT => Some(Value::Number(i as f64)),
        _ => None,
    }
}

fn int_to_float(value: Value) -> Option<Value> {
    match value {
        Value::Scalar(Scalar {
            data: ScalarData::Int(i),
            units,
            ..
        }) if i.unsigned_abs() <= F64_EXACT_INT => {
            Some(Value::Scalar(Scalar::float(i as f64, 64).with_units(units)))
        }
        _ => None,
    }
}

fn uint_to_float(value: Value) -> Option<Value> {
    match value {
        Value::Scalar(Scalar {
            data: ScalarData::Uint(u),
            units,
            ..
        }) if u <= F64_EXACT_INT => Some(Value::Scalar(Scalar::float(u as f64, 64).with_units(units))),
        _ => None,
    }
}

fn float_to_complex(value: Value) -> Option<Value> {
    match value {
        Value::Scalar(Scalar {
            data: ScalarData::Float(f),
            precision,
            units,
        }) => Some(Value::Scalar(
            Scalar::complex(f, 0.0, precision.saturating_mul(2)).with_units(units),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::value::ValueKind;

    fn map(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = TypeRegistry::with_builtins();
        for name in [
            "null", "boolean", "integer", "number", "string", "scalar", "array", "object", "int",
            "uint", "float", "complex", "bytes",
        ] {
            assert!(registry.contains(name), "missing builtin {name}");
        }
        assert_eq!(registry.len(), 13);
        assert!(matches!(
            registry.lookup("tensor"),
            Err(CodecError::UnknownType(ref name)) if name == "tensor"
        ));
    }

    #[test]
    fn infer_prefers_more_specific_types() {
        let registry = TypeRegistry::with_builtins();
        let infer = |value: Value| registry.infer(&value).unwrap().name().to_string();

        assert_eq!(infer(Value::Scalar(Scalar::float(1.0, 64))), "float");
        assert_eq!(infer(Value::Scalar(Scalar::uint(1, 8))), "uint");
        assert_eq!(infer(Value::Bytes(vec![1, 2])), "bytes");
        assert_eq!(infer(Value::Integer(3)), "integer");
        assert_eq!(infer(Value::Array(vec![])), "array");

        let empty = TypeRegistry::new();
        assert!(matches!(
            empty.infer(&Value::Null),
            Err(CodecError::NoMatchingType(_))
        ));
    }

    #[test]
    fn duplicate_registration_requires_replacement() {
        let mut registry = TypeRegistry::with_builtins();
        let dup = TypeDescriptor::new("float", TypeClass::Number).accepting(&[ValueKind::Number]);
        assert!(matches!(
            registry.register(dup),
            Err(CodecError::DuplicateType(ref name)) if name == "float"
        ));

        let replacement = TypeDescriptor::new("string", TypeClass::String)
            .accepting(&[ValueKind::String, ValueKind::Bytes])
            .with_specificity(5)
            .replacing();
        registry.register(replacement).unwrap();
        assert_eq!(registry.len(), 13);
        assert_eq!(registry.infer(&Value::Bytes(vec![])).unwrap().name(), "string");
        assert_eq!(registry.descriptors().next().unwrap().name(), "string");
    }

    #[test]
    fn equal_specificity_keeps_registration_order() {
        let mut registry = TypeRegistry::new();
        for name in ["first", "second"] {
            registry
                .register(TypeDescriptor::new(name, TypeClass::Number).accepting(&[ValueKind::Number]))
                .unwrap();
        }
        assert_eq!(registry.infer(&Value::Number(1.0)).unwrap().name(), "first");
    }

    #[test]
    fn to_base_recurses_and_effective_name_reverses() {
        let registry = TypeRegistry::with_builtins();
        let schema = map(json!({
            "type": "array",
            "items": [{"type": "float", "precision": 32}, {"type": "integer"}]
        }));
        assert_eq!(
            JsonValue::Object(registry.to_base(&schema)),
            json!({
                "type": "array",
                "items": [
                    {"type": "scalar", "subtype": "float", "precision": 32},
                    {"type": "integer"}
                ]
            })
        );

        let base = map(json!({"type": "scalar", "subtype": "uint", "precision": 8}));
        assert_eq!(registry.effective_type_name(&base), "uint");
        assert_eq!(registry.effective_type_name(&map(json!({"type": "number"}))), "number");
    }

    #[test]
    fn builtin_conversions_are_lossless() {
        let registry = TypeRegistry::with_builtins();
        let int_to_float = registry.conversion("int", "float").unwrap();
        assert_eq!(
            int_to_float(Value::Scalar(Scalar::int(7, 32).with_units("s"))),
            Some(Value::Scalar(Scalar::float(7.0, 64).with_units("s")))
        );
        assert_eq!(int_to_float(Value::Scalar(Scalar::int(i64::MAX, 64))), None);

        let to_number = registry.conversion("integer", "number").unwrap();
        assert_eq!(to_number(Value::Integer(-4)), Some(Value::Number(-4.0)));

        let to_complex = registry.conversion("float", "complex").unwrap();
        assert_eq!(
            to_complex(Value::Scalar(Scalar::float(1.5, 32))),
            Some(Value::Scalar(Scalar::complex(1.5, 0.0, 64)))
        );
        assert!(registry.conversion("float", "int").is_none());
    }

    #[test]
    fn global_registry_is_install_once() {
        let global = TypeRegistry::global();
        assert!(global.contains("scalar"));
        assert!(matches!(
            TypeRegistry::install_global(TypeRegistry::new()),
            Err(CodecError::RegistryInstalled)
        ));
    }
}
