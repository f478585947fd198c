/// Errors that can occur in comm operations.
#[derive(Debug, thiserror::Error)]
pub enum CommError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] typedwire_transport::TransportError),

    /// Framing or chunking error.
    #[error("frame error: {0}")]
    Frame(#[from] typedwire_frame::FrameError),

    /// Encode/decode error.
    #[error("codec error: {0}")]
    Codec(#[from] typedwire_types::CodecError),

    /// No address is configured for the endpoint.
    #[error("no address for comm '{name}' (set {var})")]
    MissingAddress { name: String, var: String },

    /// An environment option has an unusable value.
    #[error("invalid {var}={value:?}: {reason}")]
    InvalidConfig {
        var: String,
        value: String,
        reason: String,
    },

    /// The requested transport is not available on this platform.
    #[error("transport '{0}' is not supported on this platform")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, CommError>;
