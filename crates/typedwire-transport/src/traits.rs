use bytes::Bytes;

use crate::error::Result;

/// A bidirectional, message-oriented transport channel.
///
/// Every `send` delivers exactly one message to the peer and every successful
/// `try_recv` yields exactly one message; there is no stream reassembly at
/// this layer. Messages larger than [`Channel::max_message_size`] are
/// rejected, never split.
///
/// Channels are used from a single thread at a time. Callers that need to
/// share one across threads must serialize access externally.
pub trait Channel {
    /// Send one message.
    fn send(&mut self, msg: &[u8]) -> Result<()>;

    /// Receive one message if one is available, without blocking.
    fn try_recv(&mut self) -> Result<Option<Bytes>>;

    /// Number of messages known to be waiting.
    ///
    /// Implementations that cannot count report `1` when at least one message
    /// is ready and `0` otherwise.
    fn pending(&mut self) -> Result<usize>;

    /// Largest message this channel carries in a single operation.
    fn max_message_size(&self) -> usize;

    /// Short channel name for diagnostics.
    fn name(&self) -> &str {
        "channel"
    }
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn send(&mut self, msg: &[u8]) -> Result<()> {
        (**self).send(msg)
    }

    fn try_recv(&mut self) -> Result<Option<Bytes>> {
        (**self).try_recv()
    }

    fn pending(&mut self) -> Result<usize> {
        (**self).pending()
    }

    fn max_message_size(&self) -> usize {
        (**self).max_message_size()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn send(&mut self, msg: &[u8]) -> Result<()> {
        (**self).send(msg)
    }

    fn try_recv(&mut self) -> Result<Option<Bytes>> {
        (**self).try_recv()
    }

    fn pending(&mut self) -> Result<usize> {
        (**self).pending()
    }

    fn max_message_size(&self) -> usize {
        (**self).max_message_size()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
