use std::fmt;
use std::io;

use typedwire::frame::FrameError;
use typedwire::transport::TransportError;
use typedwire::types::CodecError;

pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    let code = match err {
        CodecError::UnknownType(_) | CodecError::Schema { .. } | CodecError::TypeChange { .. } => USAGE,
        CodecError::RegistryInstalled => INTERNAL,
        _ => DATA_INVALID,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Codec(err) => codec_error(context, err),
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::ReservedKey(_) => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        FrameError::TransportInterrupted { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        FrameError::Protocol(_)
        | FrameError::MissingMarker
        | FrameError::InvalidLength(_)
        | FrameError::PayloadTooLarge { .. }
        | FrameError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

pub fn usage(message: impl Into<String>) -> CliError {
    CliError::new(USAGE, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_violations_are_reported() {
        let err = CodecError::Encode {
            type_name: "scalar".to_string(),
            value: "Number(1.5)".to_string(),
            violations: vec!["$: precision 64 exceeds 32".to_string()],
        };
        let cli = codec_error("encode failed", err);
        assert_eq!(cli.code, DATA_INVALID);
        assert!(cli.message.starts_with("encode failed: cannot encode"));
        assert!(cli.message.contains("precision 64 exceeds 32"));
    }

    #[test]
    fn frame_errors_map_to_exit_codes() {
        assert_eq!(frame_error("x", FrameError::MissingMarker).code, DATA_INVALID);
        assert_eq!(frame_error("x", FrameError::ReservedKey("size".into())).code, USAGE);
        assert_eq!(
            frame_error("x", FrameError::Transport(TransportError::Closed)).code,
            TRANSPORT_ERROR
        );
        assert_eq!(
            frame_error("x", FrameError::Codec(CodecError::UnknownType("nope".into()))).code,
            USAGE
        );
    }
}
