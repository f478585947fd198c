use std::time::Duration;

use crate::codec::{DEFAULT_MAX_CHUNK, DEFAULT_MAX_MESSAGE};

/// Interval between queue polls while waiting for a message.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Slower poll interval used when a client runs under a debugger.
pub const DEBUG_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration for chunked transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Largest single message in bytes. Default: 64 KiB.
    pub max_chunk: usize,
    /// Largest length a peer may announce for a chunked transfer.
    /// Default: 64 MiB.
    pub max_message: usize,
    /// Sleep between polls of an empty channel.
    pub poll_interval: Duration,
    /// Give up waiting for a message after this long. `None` blocks forever.
    pub timeout: Option<Duration>,
}

impl ChunkConfig {
    /// Configuration for a client running in debug mode.
    pub fn client_debug() -> Self {
        Self {
            poll_interval: DEBUG_POLL_INTERVAL,
            ..Self::default()
        }
    }

    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk;
        self
    }

    pub fn with_max_message(mut self, max_message: usize) -> Self {
        self.max_message = max_message;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk: DEFAULT_MAX_CHUNK,
            max_message: DEFAULT_MAX_MESSAGE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}
