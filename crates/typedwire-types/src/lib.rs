//! Typed values, their type definitions, and the codec between them.
//!
//! A [`TypeDescriptor`] describes one named type (`scalar`, `array`,
//! `object`, `float`, ...). Descriptors live in a [`TypeRegistry`], which a
//! [`Codec`] uses to validate, encode and decode [`Value`]s:
//!
//! ```text
//! encode: coerce -> validate_instance -> transform -> encode_type -> encode_data
//! decode: check_encoded -> (fallbacks) -> decode_data -> transform
//! ```
//!
//! Encoding produces [`Metadata`] describing the value plus payload bytes.
//! Numeric precision and physical units are part of the type system; unit
//! conversion only ever happens in the explicit `transform` step.

pub mod codec;
pub mod config;
pub mod convert;
pub mod data;
pub mod descriptor;
pub mod error;
pub mod properties;
pub mod registry;
pub mod typedef;
pub mod units;
pub mod validate;
pub mod value;

pub use codec::Codec;
pub use config::{CodecConfig, DecodeFallback};
pub use descriptor::{FixedSubtype, TypeClass, TypeDescriptor};
pub use error::{CodecError, Result};
pub use registry::{Conversion, TypeRegistry};
pub use typedef::{Metadata, Typedef};
pub use validate::{compare_schema, validate_definition, validate_instance, validate_metadata, Violation};
pub use value::{Scalar, ScalarData, Value, ValueKind};
