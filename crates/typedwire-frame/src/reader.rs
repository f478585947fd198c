use std::thread;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};
use typedwire_transport::Channel;

use crate::codec::parse_length;
use crate::config::ChunkConfig;
use crate::error::{FrameError, Result};

/// Receives messages, reassembling payloads sent with
/// [`ChunkWriter::send_chunked`](crate::ChunkWriter::send_chunked).
///
/// Waiting is done by polling the channel; callers always get whole
/// messages.
pub struct ChunkReader<C> {
    inner: C,
    config: ChunkConfig,
}

impl<C: Channel> ChunkReader<C> {
    /// Create a new chunk reader with default configuration.
    pub fn new(inner: C) -> Self {
        Self::with_config(inner, ChunkConfig::default())
    }

    /// Create a new chunk reader with explicit configuration.
    pub fn with_config(inner: C, config: ChunkConfig) -> Self {
        Self { inner, config }
    }

    /// Receive the next message (blocking).
    ///
    /// Polls the channel every `poll_interval` until a message arrives.
    /// Returns `Err(FrameError::Timeout)` once the configured timeout has
    /// elapsed.
    pub fn recv(&mut self) -> Result<Bytes> {
        let started = Instant::now();
        loop {
            if self.inner.pending()? > 0 {
                if let Some(msg) = self.inner.try_recv()? {
                    trace!(channel = self.inner.name(), size = msg.len(), "received message");
                    return Ok(msg);
                }
            }

            let mut wait = self.config.poll_interval;
            if let Some(timeout) = self.config.timeout {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    return Err(FrameError::Timeout(timeout));
                }
                wait = wait.min(timeout - elapsed);
            }
            trace!(channel = self.inner.name(), "no data, sleeping");
            thread::sleep(wait);
        }
    }

    /// Receive a payload sent as a length message followed by chunks.
    pub fn recv_chunked(&mut self) -> Result<Bytes> {
        let header = self.recv()?;
        let expected = parse_length(&header)
            .ok_or_else(|| FrameError::InvalidLength(String::from_utf8_lossy(&header).into_owned()))?;
        self.recv_chunks(expected)
    }

    /// Receive chunks until `expected` bytes have arrived.
    ///
    /// A length above `max_message` is rejected before any chunk is read.
    /// A failing receive discards the partial payload and reports
    /// [`FrameError::TransportInterrupted`] with the length received so far.
    pub fn recv_chunks(&mut self, expected: usize) -> Result<Bytes> {
        if expected > self.config.max_message {
            return Err(FrameError::PayloadTooLarge {
                size: expected,
                max: self.config.max_message,
            });
        }
        let mut payload = BytesMut::with_capacity(expected.min(self.config.max_chunk));
        while payload.len() < expected {
            match self.recv() {
                Ok(chunk) => {
                    payload.extend_from_slice(&chunk);
                    trace!(received = payload.len(), expected, "received chunk");
                }
                Err(err) => {
                    warn!(
                        channel = self.inner.name(),
                        received = payload.len(),
                        expected,
                        error = %err,
                        "chunked receive interrupted"
                    );
                    return Err(FrameError::TransportInterrupted {
                        transferred: payload.len(),
                        expected,
                    });
                }
            }
        }

        if payload.len() > expected {
            return Err(FrameError::Protocol(format!(
                "received {} bytes, {expected} announced",
                payload.len()
            )));
        }
        debug!(channel = self.inner.name(), size = expected, "chunked receive complete");
        Ok(payload.freeze())
    }

    /// Borrow the underlying channel.
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// Mutably borrow the underlying channel.
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    /// Consume the reader and return the inner channel.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Current chunk reader configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use typedwire_transport::MemoryQueue;

    use super::*;
    use crate::codec::{DEFAULT_MAX_CHUNK, DEFAULT_MAX_MESSAGE};
    use crate::writer::ChunkWriter;

    /// Counts transport operations passing through a channel.
    struct Counting<C> {
        inner: C,
        sends: usize,
        recvs: usize,
    }

    impl<C> Counting<C> {
        fn new(inner: C) -> Self {
            Self {
                inner,
                sends: 0,
                recvs: 0,
            }
        }
    }

    impl<C: Channel> Channel for Counting<C> {
        fn send(&mut self, msg: &[u8]) -> typedwire_transport::Result<()> {
            self.sends += 1;
            self.inner.send(msg)
        }

        fn try_recv(&mut self) -> typedwire_transport::Result<Option<Bytes>> {
            let msg = self.inner.try_recv()?;
            if msg.is_some() {
                self.recvs += 1;
            }
            Ok(msg)
        }

        fn pending(&mut self) -> typedwire_transport::Result<usize> {
            self.inner.pending()
        }

        fn max_message_size(&self) -> usize {
            self.inner.max_message_size()
        }
    }

    fn fast(max_chunk: usize) -> ChunkConfig {
        ChunkConfig::default()
            .with_max_chunk(max_chunk)
            .with_poll_interval(Duration::from_millis(1))
            .with_timeout(Some(Duration::from_millis(50)))
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn reassembles_boundary_sizes() {
        const MAX: usize = 16;
        for size in [0, 1, MAX - 1, MAX, MAX + 1, 3 * MAX] {
            let queue = MemoryQueue::new(MAX);
            let mut writer = ChunkWriter::with_config(Counting::new(queue.clone()), fast(MAX));
            let mut reader = ChunkReader::with_config(Counting::new(queue), fast(MAX));

            let payload = pattern(size);
            writer.send_chunked(&payload).unwrap();
            let received = reader.recv_chunked().unwrap();

            assert_eq!(received.as_ref(), payload.as_slice(), "size {size}");
            let ops = size.div_ceil(MAX) + 1;
            assert_eq!(writer.get_ref().sends, ops, "sends for size {size}");
            assert_eq!(reader.get_ref().recvs, ops, "receives for size {size}");
        }
    }

    #[test]
    fn reassembles_default_chunk_size() {
        let queue = MemoryQueue::new(DEFAULT_MAX_CHUNK);
        let mut writer = ChunkWriter::with_config(Counting::new(queue.clone()), fast(DEFAULT_MAX_CHUNK));
        let mut reader = ChunkReader::with_config(queue, fast(DEFAULT_MAX_CHUNK));

        let payload = pattern(3 * DEFAULT_MAX_CHUNK + 1);
        writer.send_chunked(&payload).unwrap();

        assert_eq!(reader.recv_chunked().unwrap().as_ref(), payload.as_slice());
        assert_eq!(writer.get_ref().sends, 5);
    }

    #[test]
    fn recv_times_out_on_empty_channel() {
        let mut reader = ChunkReader::with_config(MemoryQueue::new(16), fast(16));
        let started = Instant::now();

        let err = reader.recv().unwrap_err();
        assert!(matches!(err, FrameError::Timeout(_)));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn recv_returns_queued_message() {
        let mut queue = MemoryQueue::new(16);
        queue.send(b"ready").unwrap();
        let mut reader = ChunkReader::with_config(queue, fast(16));

        assert_eq!(reader.recv().unwrap().as_ref(), b"ready");
    }

    #[test]
    fn missing_chunks_interrupt_transfer() {
        let mut queue = MemoryQueue::new(16);
        queue.send(b"48").unwrap();
        queue.send(&[1u8; 16]).unwrap();
        let mut reader = ChunkReader::with_config(queue, fast(16));

        let err = reader.recv_chunked().unwrap_err();
        assert!(matches!(
            err,
            FrameError::TransportInterrupted {
                transferred: 16,
                expected: 48
            }
        ));
    }

    #[test]
    fn non_numeric_length_is_rejected() {
        let mut queue = MemoryQueue::new(16);
        queue.send(b"hello").unwrap();
        let mut reader = ChunkReader::with_config(queue, fast(16));

        let err = reader.recv_chunked().unwrap_err();
        assert!(matches!(err, FrameError::InvalidLength(ref s) if s == "hello"));
    }

    #[test]
    fn oversized_length_is_rejected_before_reading_chunks() {
        let mut queue = MemoryQueue::new(32);
        queue.send(usize::MAX.to_string().as_bytes()).unwrap();
        queue.send(b"chunk").unwrap();
        let mut reader = ChunkReader::with_config(queue.clone(), fast(16));

        let err = reader.recv_chunked().unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge { size, max } if size == usize::MAX && max == DEFAULT_MAX_MESSAGE
        ));
        assert_eq!(queue.len(), 1, "no chunk should be consumed");
    }

    #[test]
    fn length_above_configured_limit_is_rejected() {
        let mut queue = MemoryQueue::new(16);
        queue.send(b"33").unwrap();
        let mut reader = ChunkReader::with_config(queue, fast(16).with_max_message(32));

        assert!(matches!(
            reader.recv_chunked(),
            Err(FrameError::PayloadTooLarge { size: 33, max: 32 })
        ));
    }

    #[test]
    fn length_at_configured_limit_is_accepted() {
        let queue = MemoryQueue::new(16);
        let mut writer = ChunkWriter::with_config(queue.clone(), fast(16));
        let mut reader = ChunkReader::with_config(queue, fast(16).with_max_message(32));

        let payload = pattern(32);
        writer.send_chunked(&payload).unwrap();
        assert_eq!(reader.recv_chunked().unwrap().as_ref(), payload.as_slice());
    }

    #[test]
    fn overlong_chunk_is_protocol_error() {
        let mut queue = MemoryQueue::new(16);
        queue.send(b"4").unwrap();
        queue.send(b"abcdef").unwrap();
        let mut reader = ChunkReader::with_config(queue, fast(16));

        assert!(matches!(reader.recv_chunked(), Err(FrameError::Protocol(_))));
    }
}
