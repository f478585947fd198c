use std::fmt;

use crate::error::{CommError, Result};

/// Whether a comm receives or sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Suffix of the environment variable holding the address.
    pub fn env_suffix(self) -> &'static str {
        match self {
            Self::Input => "_IN",
            Self::Output => "_OUT",
        }
    }
}

/// Where a named comm is connected: a queue name or a socket path, resolved
/// from `<NAME>_IN` / `<NAME>_OUT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAddress {
    pub name: String,
    pub direction: Direction,
    pub address: String,
}

impl ChannelAddress {
    /// Resolve `name` from the process environment.
    pub fn from_env(name: &str, direction: Direction) -> Result<Self> {
        Self::resolve(name, direction, |var| std::env::var(var).ok())
    }

    /// Resolve `name` through `lookup`.
    pub fn resolve(
        name: &str,
        direction: Direction,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let var = Self::env_var(name, direction);
        match lookup(&var) {
            Some(address) if !address.trim().is_empty() => Ok(Self {
                name: name.to_string(),
                direction,
                address,
            }),
            _ => Err(CommError::MissingAddress {
                name: name.to_string(),
                var,
            }),
        }
    }

    /// Environment variable naming the address of `name`.
    pub fn env_var(name: &str, direction: Direction) -> String {
        format!("{name}{}", direction.env_suffix())
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}={}", self.name, self.direction.env_suffix(), self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_direction() {
        let lookup = |var: &str| match var {
            "sensor_IN" => Some("q-in".to_string()),
            "sensor_OUT" => Some("q-out".to_string()),
            _ => None,
        };

        let input = ChannelAddress::resolve("sensor", Direction::Input, lookup).unwrap();
        assert_eq!(input.address, "q-in");
        let output = ChannelAddress::resolve("sensor", Direction::Output, lookup).unwrap();
        assert_eq!(output.address, "q-out");
        assert_eq!(output.to_string(), "sensor_OUT=q-out");
    }

    #[test]
    fn missing_or_blank_address() {
        let err = ChannelAddress::resolve("absent", Direction::Input, |_| None).unwrap_err();
        assert!(matches!(err, CommError::MissingAddress { ref var, .. } if var == "absent_IN"));

        let blank = ChannelAddress::resolve("blank", Direction::Output, |_| Some("  ".to_string()));
        assert!(blank.is_err());
    }
}
