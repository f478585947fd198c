use std::fmt;
use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::{Map, Value as JsonValue};

use crate::error::{CodecError, Result};
use crate::properties::meta_schema;
use crate::value::{Value, ValueKind};

/// Properties every type recognizes.
const COMMON: [&str; 3] = ["type", "title", "description"];

/// A subtype that pins some of its base type's properties.
///
/// `float` is `scalar` with `subtype = "float"`: its metadata can be
/// rewritten to the base form and back.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSubtype {
    pub base: String,
    pub fixed: Map<String, JsonValue>,
}

impl FixedSubtype {
    pub fn new(base: &str, fixed: Map<String, JsonValue>) -> Self {
        Self {
            base: base.to_string(),
            fixed,
        }
    }

    /// Rewrite a schema of this subtype into its base form.
    pub fn to_base(&self, schema: &Map<String, JsonValue>) -> Map<String, JsonValue> {
        let mut out = schema.clone();
        out.insert("type".to_string(), JsonValue::String(self.base.clone()));
        for (key, value) in &self.fixed {
            out.insert(key.clone(), value.clone());
        }
        out
    }

    /// Rewrite a base-form schema as subtype `name`, if every pinned
    /// property matches.
    pub fn from_base(
        &self,
        name: &str,
        schema: &Map<String, JsonValue>,
    ) -> Option<Map<String, JsonValue>> {
        if schema.get("type").and_then(JsonValue::as_str) != Some(self.base.as_str()) {
            return None;
        }
        if !self.matches(schema) {
            return None;
        }
        let mut out = schema.clone();
        for key in self.fixed.keys() {
            out.remove(key);
        }
        out.insert("type".to_string(), JsonValue::String(name.to_string()));
        Some(out)
    }

    pub(crate) fn matches(&self, schema: &Map<String, JsonValue>) -> bool {
        self.fixed
            .iter()
            .all(|(key, value)| schema.get(key) == Some(value))
    }
}

/// Structural class of a type, which selects how values are validated,
/// encoded and decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeClass {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Scalar,
    Array,
    Object,
    Fixed(FixedSubtype),
}

impl TypeClass {
    /// Whether values of this class are laid out as raw binary payloads.
    pub fn is_binary(&self) -> bool {
        match self {
            Self::Scalar => true,
            Self::Fixed(fixed) => fixed.base == "scalar",
            _ => false,
        }
    }

    /// Subtype pinned by a fixed scalar type.
    pub fn fixed_subtype(&self) -> Option<&str> {
        match self {
            Self::Fixed(fixed) => fixed.fixed.get("subtype").and_then(JsonValue::as_str),
            _ => None,
        }
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean => f.write_str("boolean"),
            Self::Integer => f.write_str("integer"),
            Self::Number => f.write_str("number"),
            Self::String => f.write_str("string"),
            Self::Scalar => f.write_str("scalar"),
            Self::Array => f.write_str("array"),
            Self::Object => f.write_str("object"),
            Self::Fixed(fixed) => write!(f, "fixed {}", fixed.base),
        }
    }
}

/// Description of one named type.
///
/// Descriptors are immutable once built and shared through the registry.
pub struct TypeDescriptor {
    name: String,
    description: String,
    properties: Vec<String>,
    definition_properties: Vec<String>,
    metadata_properties: Vec<String>,
    property_schemas: Map<String, JsonValue>,
    specificity: i32,
    accepts: Vec<ValueKind>,
    class: TypeClass,
    replaces_existing: bool,
    definition_validator: OnceLock<std::result::Result<Validator, String>>,
    metadata_validator: OnceLock<std::result::Result<Validator, String>>,
}

impl TypeDescriptor {
    /// Start a descriptor recognizing only the common properties.
    pub fn new(name: &str, class: TypeClass) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            properties: COMMON.iter().map(|s| s.to_string()).collect(),
            definition_properties: vec!["type".to_string()],
            metadata_properties: vec!["type".to_string()],
            property_schemas: Map::new(),
            specificity: 0,
            accepts: Vec::new(),
            class,
            replaces_existing: false,
            definition_validator: OnceLock::new(),
            metadata_validator: OnceLock::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Add recognized properties beyond `type`, `title` and `description`.
    pub fn with_properties(mut self, names: &[&str]) -> Self {
        for name in names {
            if !self.properties.iter().any(|p| p == name) {
                self.properties.push(name.to_string());
            }
        }
        self
    }

    /// Properties required in a type definition. Implies recognition.
    pub fn with_definition_properties(mut self, names: &[&str]) -> Self {
        self = self.with_properties(names);
        self.definition_properties = required(names);
        self
    }

    /// Properties required in encoded metadata. Implies recognition.
    pub fn with_metadata_properties(mut self, names: &[&str]) -> Self {
        self = self.with_properties(names);
        self.metadata_properties = required(names);
        self
    }

    /// Constrain a custom property's value with a JSON Schema.
    pub fn with_property_schema(mut self, name: &str, schema: JsonValue) -> Self {
        self = self.with_properties(&[name]);
        self.property_schemas.insert(name.to_string(), schema);
        self
    }

    pub fn with_specificity(mut self, specificity: i32) -> Self {
        self.specificity = specificity;
        self
    }

    pub fn accepting(mut self, kinds: &[ValueKind]) -> Self {
        self.accepts = kinds.to_vec();
        self
    }

    /// Mark the descriptor as replacing any registered type of the same name.
    pub fn replacing(mut self) -> Self {
        self.replaces_existing = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    pub fn definition_properties(&self) -> &[String] {
        &self.definition_properties
    }

    pub fn metadata_properties(&self) -> &[String] {
        &self.metadata_properties
    }

    pub fn specificity(&self) -> i32 {
        self.specificity
    }

    pub fn accepted_kinds(&self) -> &[ValueKind] {
        &self.accepts
    }

    pub fn class(&self) -> &TypeClass {
        &self.class
    }

    pub fn replaces_existing(&self) -> bool {
        self.replaces_existing
    }

    pub fn accepts(&self, value: &Value) -> bool {
        self.accepts.contains(&value.kind())
    }

    pub fn recognizes(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }

    /// Meta-schema a type definition of this type must satisfy.
    pub fn definition_schema(&self) -> JsonValue {
        meta_schema(
            &self.name,
            &self.properties,
            &self.definition_properties,
            &self.property_schemas,
            true,
        )
    }

    /// Meta-schema encoded metadata of this type must satisfy.
    pub fn metadata_schema(&self) -> JsonValue {
        meta_schema(
            &self.name,
            &self.properties,
            &self.metadata_properties,
            &self.property_schemas,
            false,
        )
    }

    pub(crate) fn definition_validator(&self) -> Result<&Validator> {
        let compiled = self
            .definition_validator
            .get_or_init(|| compile(&self.definition_schema()));
        self.compiled(compiled)
    }

    pub(crate) fn metadata_validator(&self) -> Result<&Validator> {
        let compiled = self
            .metadata_validator
            .get_or_init(|| compile(&self.metadata_schema()));
        self.compiled(compiled)
    }

    fn compiled<'a>(
        &self,
        compiled: &'a std::result::Result<Validator, String>,
    ) -> Result<&'a Validator> {
        compiled.as_ref().map_err(|message| CodecError::Schema {
            type_name: self.name.clone(),
            violations: vec![format!("failed to compile meta-schema: {message}")],
        })
    }
}

fn required(names: &[&str]) -> Vec<String> {
    let mut out = vec!["type".to_string()];
    for name in names {
        if *name != "type" {
            out.push(name.to_string());
        }
    }
    out
}

fn compile(schema: &JsonValue) -> std::result::Result<Validator, String> {
    jsonschema::validator_for(schema).map_err(|err| err.to_string())
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("specificity", &self.specificity)
            .field("properties", &self.properties)
            .field("accepts", &self.accepts)
            .finish()
    }
}

/// Descriptors for the built-in types, in registration order.
pub fn builtin_descriptors() -> Vec<TypeDescriptor> {
    use ValueKind as K;

    let json_types = [
        ("null", TypeClass::Null, K::Null, "JSON null"),
        ("boolean", TypeClass::Boolean, K::Boolean, "JSON boolean"),
        ("integer", TypeClass::Integer, K::Integer, "JSON integer"),
        ("number", TypeClass::Number, K::Number, "JSON number"),
        ("string", TypeClass::String, K::String, "JSON string"),
    ];
    let mut out: Vec<TypeDescriptor> = json_types
        .into_iter()
        .map(|(name, class, kind, description)| {
            TypeDescriptor::new(name, class)
                .with_description(description)
                .accepting(&[kind])
        })
        .collect();

    out.push(
        TypeDescriptor::new("scalar", TypeClass::Scalar)
            .with_description("Fixed-width number or byte string with precision and units")
            .with_properties(&["subtype", "precision", "units"])
            .with_definition_properties(&["type", "subtype"])
            .with_metadata_properties(&["type", "subtype", "precision", "units"])
            .accepting(&[K::Int, K::Uint, K::Float, K::Complex, K::Bytes]),
    );
    out.push(
        TypeDescriptor::new("array", TypeClass::Array)
            .with_description("Ordered sequence of typed items")
            .with_properties(&["items"])
            .with_metadata_properties(&["type", "items"])
            .accepting(&[K::Array]),
    );
    out.push(
        TypeDescriptor::new("object", TypeClass::Object)
            .with_description("Mapping of names to typed properties")
            .with_properties(&["properties"])
            .with_metadata_properties(&["type", "properties"])
            .accepting(&[K::Object]),
    );

    let fixed_scalars = [
        ("int", K::Int, "Signed integer scalar"),
        ("uint", K::Uint, "Unsigned integer scalar"),
        ("float", K::Float, "Floating point scalar"),
        ("complex", K::Complex, "Complex floating point scalar"),
        ("bytes", K::Bytes, "Raw byte string"),
    ];
    for (name, kind, description) in fixed_scalars {
        let mut fixed = Map::new();
        fixed.insert("subtype".to_string(), JsonValue::String(name.to_string()));
        out.push(
            TypeDescriptor::new(name, TypeClass::Fixed(FixedSubtype::new("scalar", fixed)))
                .with_description(description)
                .with_properties(&["precision", "units"])
                .with_metadata_properties(&["type", "precision", "units"])
                .with_specificity(1)
                .accepting(&[kind]),
        );
    }
    out
}
