//! Named endpoints that send and receive typed values.
//!
//! A [`Comm`] pairs a transport channel with a [`Serializer`]: `send` frames
//! a value and chunks it when it exceeds the channel limit, `recv` reverses
//! both steps. Endpoint addresses and transfer options come from the
//! environment (see [`CommConfig::from_env`] and [`ChannelAddress`]).
//!
//! [`Serializer`]: typedwire_frame::Serializer

pub mod address;
pub mod comm;
pub mod config;
pub mod error;

pub use address::{ChannelAddress, Direction};
pub use comm::{open, open_with, Comm, DynChannel};
pub use config::{CommConfig, TransportKind};
pub use error::{CommError, Result};
