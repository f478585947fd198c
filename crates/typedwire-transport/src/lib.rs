//! Message-oriented transport channels.
//!
//! A channel moves whole messages of bounded size between two endpoints.
//! It is the lowest layer of typedwire; framing and chunking build on the
//! [`Channel`] trait defined here.
//!
//! Two reference channels are provided:
//! - [`MemoryQueue`]: process-local named queues (SysV-queue-like semantics)
//! - [`DatagramChannel`]: Unix datagram sockets (Linux/macOS)

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod datagram;

pub use error::{Result, TransportError};
pub use memory::{MemoryQueue, DEFAULT_QUEUE_CAPACITY};
pub use traits::Channel;

#[cfg(unix)]
pub use datagram::DatagramChannel;
