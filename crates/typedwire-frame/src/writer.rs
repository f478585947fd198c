use tracing::{debug, trace, warn};
use typedwire_transport::Channel;

use crate::config::ChunkConfig;
use crate::error::{FrameError, Result};

/// Sends messages, splitting payloads that exceed the chunk limit.
pub struct ChunkWriter<C> {
    inner: C,
    config: ChunkConfig,
}

impl<C: Channel> ChunkWriter<C> {
    /// Create a new chunk writer with default configuration.
    pub fn new(inner: C) -> Self {
        Self::with_config(inner, ChunkConfig::default())
    }

    /// Create a new chunk writer with explicit configuration.
    pub fn with_config(inner: C, config: ChunkConfig) -> Self {
        Self { inner, config }
    }

    /// Largest message sent in one transport operation: the configured chunk
    /// size, capped by what the channel can carry.
    pub fn max_chunk(&self) -> usize {
        self.config.max_chunk.min(self.inner.max_message_size())
    }

    /// Send a message that fits in a single transport operation.
    pub fn send(&mut self, msg: &[u8]) -> Result<()> {
        let max = self.max_chunk();
        if msg.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: msg.len(),
                max,
            });
        }
        self.inner.send(msg)?;
        trace!(channel = self.inner.name(), size = msg.len(), "sent message");
        Ok(())
    }

    /// Send a payload of any size: a decimal length message, then chunks of
    /// at most [`ChunkWriter::max_chunk`] bytes.
    ///
    /// Failing to send the length is returned as is. A failing chunk aborts
    /// the transfer with [`FrameError::TransportInterrupted`]; nothing is
    /// retried.
    pub fn send_chunked(&mut self, payload: &[u8]) -> Result<()> {
        let expected = payload.len();
        self.send(expected.to_string().as_bytes())?;

        let mut transferred = 0usize;
        for chunk in payload.chunks(self.max_chunk().max(1)) {
            if let Err(err) = self.send(chunk) {
                warn!(
                    channel = self.inner.name(),
                    transferred,
                    expected,
                    error = %err,
                    "chunked send interrupted"
                );
                return Err(FrameError::TransportInterrupted {
                    transferred,
                    expected,
                });
            }
            transferred += chunk.len();
            trace!(transferred, expected, "sent chunk");
        }

        debug!(channel = self.inner.name(), size = expected, "chunked send complete");
        Ok(())
    }

    /// Borrow the underlying channel.
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// Mutably borrow the underlying channel.
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    /// Consume the writer and return the inner channel.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Current chunk writer configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }
}
