use std::path::PathBuf;

/// Errors that can occur in transport channel operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The message exceeds the channel's atomic message size.
    #[error("message too large for channel ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The channel cannot accept more messages until some are received.
    #[error("channel '{name}' is full ({capacity} messages queued)")]
    Full { name: String, capacity: usize },

    /// The peer's receive buffer is full; the message was not sent.
    #[error("channel '{0}' would block: peer is not receiving")]
    WouldBlock(String),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The channel has been closed.
    #[error("channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
