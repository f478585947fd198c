use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};
use typedwire_frame::{is_framed, parse_length, ChunkConfig, ChunkReader, ChunkWriter, Serializer};
use typedwire_transport::{Channel, MemoryQueue};
use typedwire_types::{Metadata, Value};

use crate::address::{ChannelAddress, Direction};
use crate::config::{CommConfig, TransportKind};
use crate::error::Result;

/// A boxed channel chosen at runtime.
pub type DynChannel = Box<dyn Channel + Send>;

/// A named endpoint sending and receiving typed values over a channel.
///
/// Messages that fit the chunk limit travel as one framed message; larger
/// ones as a length message followed by chunks. Both ends decide from the
/// first message which form follows.
pub struct Comm<C> {
    name: String,
    channel: C,
    serializer: Serializer,
    config: ChunkConfig,
    eof: bool,
}

impl<C: Channel> Comm<C> {
    pub fn new(name: impl Into<String>, channel: C, serializer: Serializer, config: ChunkConfig) -> Self {
        Self {
            name: name.into(),
            channel,
            serializer,
            config,
            eof: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Whether the peer has signaled end of stream.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Send a value.
    pub fn send(&mut self, value: &Value) -> Result<()> {
        self.send_with_header(value, None)
    }

    /// Send a value with extra header keys merged into its metadata.
    pub fn send_with_header(&mut self, value: &Value, header: Option<&Map<String, JsonValue>>) -> Result<()> {
        let msg = self.serializer.serialize(value, header)?;
        self.send_message(&msg)
    }

    /// Tell the peer nothing more will be sent.
    pub fn send_eof(&mut self) -> Result<()> {
        let msg = self.serializer.serialize_eof();
        self.writer().send(&msg)?;
        info!(comm = %self.name, "sent EOF");
        Ok(())
    }

    /// Send an already serialized message.
    ///
    /// A message that could be mistaken for a chunked-transfer length is
    /// itself sent chunked.
    pub fn send_message(&mut self, msg: &[u8]) -> Result<()> {
        let name = self.name.clone();
        let mut writer = self.writer();
        if msg.len() <= writer.max_chunk() && parse_length(msg).is_none() {
            writer.send(msg)?;
        } else {
            writer.send_chunked(msg)?;
        }
        debug!(comm = %name, size = msg.len(), "sent message");
        Ok(())
    }

    /// Receive the next value (blocking, subject to the configured timeout).
    pub fn recv(&mut self) -> Result<(Value, Metadata)> {
        let msg = self.recv_message()?;
        let (value, metadata) = self.serializer.deserialize(&msg, None)?;
        self.note_eof(&metadata);
        Ok((value, metadata))
    }

    /// Receive the next message without decoding its payload.
    pub fn recv_raw(&mut self) -> Result<(Vec<u8>, Metadata)> {
        let msg = self.recv_message()?;
        let (payload, metadata) = self.serializer.deserialize_raw(&msg, None)?;
        self.note_eof(&metadata);
        Ok((payload, metadata))
    }

    /// Receive one whole message, reassembling it if it arrives chunked.
    pub fn recv_message(&mut self) -> Result<Vec<u8>> {
        let mut reader = self.reader();
        let first = reader.recv()?;
        if is_framed(&first) {
            return Ok(first.to_vec());
        }
        match parse_length(&first) {
            Some(expected) => Ok(reader.recv_chunks(expected)?.to_vec()),
            None => Ok(first.to_vec()),
        }
    }

    fn note_eof(&mut self, metadata: &Metadata) {
        if metadata.is_eof() {
            self.eof = true;
            info!(comm = %self.name, "received EOF");
        }
    }

    fn writer(&mut self) -> ChunkWriter<&mut C> {
        ChunkWriter::with_config(&mut self.channel, self.config.clone())
    }

    fn reader(&mut self) -> ChunkReader<&mut C> {
        ChunkReader::with_config(&mut self.channel, self.config.clone())
    }
}

impl<C> std::fmt::Debug for Comm<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Comm")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("eof", &self.eof)
            .finish()
    }
}

/// Open the comm `name` using addresses and options from the environment.
pub fn open(name: &str, direction: Direction, serializer: Serializer) -> Result<Comm<DynChannel>> {
    let config = CommConfig::from_env()?;
    let address = ChannelAddress::from_env(name, direction)?;
    open_with(&address, &config, serializer)
}

/// Open a comm at an explicit address.
///
/// Memory queues are opened by name. Datagram inputs bind the socket path;
/// datagram outputs connect to it.
pub fn open_with(address: &ChannelAddress, config: &CommConfig, serializer: Serializer) -> Result<Comm<DynChannel>> {
    let max = config.chunk.max_chunk;
    let channel: DynChannel = match config.transport {
        TransportKind::Memory => Box::new(MemoryQueue::open(&address.address, max)?),
        TransportKind::Datagram => open_datagram(address, max)?,
    };
    info!(%address, transport = %config.transport, "opened comm");
    Ok(Comm::new(address.name.clone(), channel, serializer, config.chunk.clone()))
}

#[cfg(unix)]
fn open_datagram(address: &ChannelAddress, max: usize) -> Result<DynChannel> {
    use typedwire_transport::DatagramChannel;

    let channel: DynChannel = match address.direction {
        Direction::Input => Box::new(DatagramChannel::bind(&address.address, max)?),
        Direction::Output => Box::new(DatagramChannel::connect(&address.address, max)?),
    };
    Ok(channel)
}

#[cfg(not(unix))]
fn open_datagram(_address: &ChannelAddress, _max: usize) -> Result<DynChannel> {
    Err(crate::error::CommError::Unsupported(TransportKind::Datagram.to_string()))
}
