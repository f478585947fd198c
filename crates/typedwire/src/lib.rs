//! Typed, self-describing messages over size-limited byte channels.
//!
//! typedwire lets independently written programs exchange structured values
//! (scalars with precision and units, arrays, nested objects) through
//! channels that only move bounded byte messages.
//!
//! # Crate Structure
//!
//! - [`transport`]: message-oriented channels (memory queues, Unix datagrams)
//! - [`types`]: type registry, validation and the encode/decode pipeline
//! - [`frame`]: self-describing framing and chunked transfer
//! - [`comm`]: named send/receive endpoints (behind `comm` feature)
//!
//! ```no_run
//! use typedwire::{Serializer, Value};
//!
//! let serializer = Serializer::default();
//! let msg = serializer.serialize(&Value::from("hello"), None).unwrap();
//! let (value, metadata) = serializer.deserialize(&msg, None).unwrap();
//! assert_eq!(value, Value::from("hello"));
//! assert_eq!(metadata.type_name(), Some("string"));
//! ```

/// Re-export transport types.
pub mod transport {
    pub use typedwire_transport::*;
}

/// Re-export type system and codec types.
pub mod types {
    pub use typedwire_types::*;
}

/// Re-export framing types.
pub mod frame {
    pub use typedwire_frame::*;
}

/// Re-export comm types (requires `comm` feature).
#[cfg(feature = "comm")]
pub mod comm {
    pub use typedwire_comm::*;
}

pub use typedwire_frame::Serializer;
pub use typedwire_types::{Codec, Metadata, Scalar, TypeRegistry, Typedef, Value};
