use std::fmt;
use std::str::FromStr;

use typedwire_frame::ChunkConfig;

use crate::error::{CommError, Result};

/// Environment variable overriding the chunk size in bytes.
pub const ENV_MAX_CHUNK: &str = "TYPEDWIRE_MAX_CHUNK";
/// Environment variable enabling client-debug mode (slower polling).
pub const ENV_CLIENT_DEBUG: &str = "TYPEDWIRE_CLIENT_DEBUG";
/// Environment variable selecting the transport: `memory` or `datagram`.
pub const ENV_TRANSPORT: &str = "TYPEDWIRE_TRANSPORT";

/// Which reference channel backs a comm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Process-local named queue.
    #[default]
    Memory,
    /// Unix datagram socket; the address is a socket path.
    Datagram,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Datagram => "datagram",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "datagram" => Ok(Self::Datagram),
            other => Err(format!("unknown transport '{other}' (expected memory or datagram)")),
        }
    }
}

/// Comm configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommConfig {
    pub transport: TransportKind,
    pub chunk: ChunkConfig,
    pub client_debug: bool,
}

impl CommConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read the configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let client_debug = lookup(ENV_CLIENT_DEBUG).is_some_and(|value| is_truthy(&value));
        let mut config = Self {
            client_debug,
            chunk: if client_debug {
                ChunkConfig::client_debug()
            } else {
                ChunkConfig::default()
            },
            ..Self::default()
        };

        if let Some(value) = lookup(ENV_TRANSPORT) {
            config.transport = value
                .parse()
                .map_err(|reason| invalid(ENV_TRANSPORT, &value, reason))?;
        }
        if let Some(value) = lookup(ENV_MAX_CHUNK) {
            config.chunk.max_chunk = match value.trim().parse::<usize>() {
                Ok(0) => return Err(invalid(ENV_MAX_CHUNK, &value, "must be positive".to_string())),
                Ok(n) => n,
                Err(err) => return Err(invalid(ENV_MAX_CHUNK, &value, err.to_string())),
            };
        }
        Ok(config)
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

fn invalid(var: &str, value: &str, reason: String) -> CommError {
    CommError::InvalidConfig {
        var: var.to_string(),
        value: value.to_string(),
        reason,
    }
}
