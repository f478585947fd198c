//! Self-describing message framing and chunked transfer.
//!
//! Every framed message carries its own type information:
//! - A header marker (`\x1eTYPEDWIRE\x1e`)
//! - JSON metadata describing the payload (type, precision, units, size, id)
//! - A second header marker
//! - The encoded payload
//!
//! Payloads larger than a channel's single-message limit are sent as a
//! decimal length message followed by fixed-size chunks.

pub mod codec;
pub mod config;
pub mod error;
pub mod reader;
pub mod serializer;
pub mod writer;

pub use codec::{
    encode_message, is_framed, parse_length, split_message, DEFAULT_MAX_CHUNK, DEFAULT_MAX_MESSAGE, EOF_SENTINEL,
    HEADER_MARKER, RESERVED_KEYS,
};
pub use config::{ChunkConfig, DEBUG_POLL_INTERVAL, DEFAULT_POLL_INTERVAL};
pub use error::{FrameError, Result};
pub use reader::ChunkReader;
pub use serializer::Serializer;
pub use writer::ChunkWriter;
