/// Errors raised by the type registry, validation and the codec pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A type definition or metadata failed structural validation.
    #[error("invalid schema for type '{type_name}': {}", .violations.join("; "))]
    Schema {
        type_name: String,
        violations: Vec<String>,
    },

    /// A value could not be encoded with the requested type definition.
    #[error("cannot encode {value} as '{type_name}': {}", .violations.join("; "))]
    Encode {
        type_name: String,
        value: String,
        violations: Vec<String>,
    },

    /// Encoded data could not be decoded with the requested type definition.
    #[error("cannot decode '{type_name}' from metadata {metadata}: {}", .violations.join("; "))]
    Decode {
        type_name: String,
        metadata: String,
        violations: Vec<String>,
    },

    /// No type is registered under this name.
    #[error("unknown type '{0}'")]
    UnknownType(String),

    /// No registered type accepts this kind of value.
    #[error("no registered type accepts a {0} value")]
    NoMatchingType(String),

    /// A type with this name is already registered.
    #[error("type '{0}' is already registered")]
    DuplicateType(String),

    /// Attempted to change the `type` of an existing type definition.
    #[error("cannot change type definition from '{from}' to '{to}'")]
    TypeChange { from: String, to: String },

    /// Container assignment past the append position.
    #[error("index {index} out of bounds for container of length {len}")]
    OutOfBounds { index: usize, len: usize },

    /// A unit expression could not be parsed or converted.
    #[error("units error: {0}")]
    Units(String),

    /// The process-wide registry was already installed or used.
    #[error("global type registry is already initialized")]
    RegistryInstalled,

    /// JSON (de)serialization of encoded data failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    pub(crate) fn encode(type_name: &str, value: &impl std::fmt::Debug, violation: String) -> Self {
        Self::Encode {
            type_name: type_name.to_string(),
            value: format!("{value:?}"),
            violations: vec![violation],
        }
    }

    pub(crate) fn decode(type_name: &str, metadata: &impl std::fmt::Display, violation: String) -> Self {
        Self::Decode {
            type_name: type_name.to_string(),
            metadata: metadata.to_string(),
            violations: vec![violation],
        }
    }

    /// Individual violations carried by schema, encode and decode errors.
    pub fn violations(&self) -> &[String] {
        match self {
            Self::Schema { violations, .. }
            | Self::Encode { violations, .. }
            | Self::Decode { violations, .. } => violations,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
