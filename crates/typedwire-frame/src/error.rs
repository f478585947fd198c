use std::time::Duration;

use typedwire_transport::TransportError;
use typedwire_types::CodecError;

/// Errors that can occur while framing, chunking or unframing messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The message does not follow the framing layout.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An unframed message was given to a serializer that only accepts
    /// framed messages.
    #[error("message has no header marker")]
    MissingMarker,

    /// A caller-supplied header used a key the framing layer owns.
    #[error("header key '{0}' is reserved")]
    ReservedKey(String),

    /// A single message exceeds the chunk limit.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The first message of a chunked transfer is not a decimal length.
    #[error("invalid chunked transfer length {0:?}")]
    InvalidLength(String),

    /// A chunked transfer stopped before every byte was moved.
    #[error("transfer interrupted after {transferred} of {expected} bytes")]
    TransportInterrupted { transferred: usize, expected: usize },

    /// No message arrived within the configured timeout.
    #[error("timed out after {0:?} waiting for a message")]
    Timeout(Duration),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid header metadata: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
