use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde_json::{Map, Value as JsonValue};
use typedwire::types::Typedef;

use crate::exit::{codec_error, usage, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod types;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a JSON value into a framed message.
    Encode(EncodeArgs),
    /// Decode a framed message.
    Decode(DecodeArgs),
    /// List registered types.
    Types(TypesArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Types(args) => types::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Value to encode, as JSON.
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub value: Option<String>,
    /// Read the JSON value from a file.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    /// Type definition (JSON object, or a bare type name).
    #[arg(long, short = 't', value_name = "JSON")]
    pub typedef: Option<String>,
    /// Extra header keys (JSON object).
    #[arg(long, value_name = "JSON")]
    pub header: Option<String>,
    /// Write the framed message to a file instead of stdout.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Framed message file. Reads stdin when omitted or `-`.
    pub input: Option<PathBuf>,
    /// Type definition to decode into (JSON object, or a bare type name).
    #[arg(long, short = 't', value_name = "JSON")]
    pub typedef: Option<String>,
    /// Report metadata and the raw payload without decoding.
    #[arg(long)]
    pub no_decode: bool,
}

#[derive(Args, Debug, Default)]
pub struct TypesArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a `--typedef` argument: a JSON object or a bare type name.
pub fn parse_typedef(arg: &str) -> CliResult<Typedef> {
    let json = match serde_json::from_str::<JsonValue>(arg) {
        Ok(json) => json,
        Err(_) => JsonValue::String(arg.trim().to_string()),
    };
    Typedef::from_json(json).map_err(|err| codec_error("invalid --typedef", err))
}

/// Parse a `--header` argument.
pub fn parse_header(arg: &str) -> CliResult<Map<String, JsonValue>> {
    match serde_json::from_str::<JsonValue>(arg) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(_) => Err(usage("--header must be a JSON object")),
        Err(err) => Err(usage(format!("--header is not valid JSON: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typedef_from_object_or_name() {
        let typedef = parse_typedef(r#"{"type": "float", "units": "cm"}"#).unwrap();
        assert_eq!(typedef.type_name(), "float");
        assert_eq!(typedef.units(), Some("cm"));

        assert_eq!(parse_typedef("bytes").unwrap().type_name(), "bytes");
        assert!(parse_typedef(r#"{"units": "cm"}"#).is_err());
    }

    #[test]
    fn header_must_be_object() {
        assert!(parse_header(r#"{"origin": "cli"}"#).is_ok());
        assert!(parse_header("[1, 2]").is_err());
        assert!(parse_header("{").is_err());
    }
}
