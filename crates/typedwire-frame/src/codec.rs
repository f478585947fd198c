use std::collections::BTreeMap;

use bytes::{BufMut, BytesMut};
use serde_json::Value as JsonValue;
use typedwire_types::Metadata;

use crate::error::{FrameError, Result};

/// Marker delimiting the metadata header: record separator, tag, record
/// separator. JSON escapes control characters, so it never occurs inside
/// serialized metadata.
pub const HEADER_MARKER: &[u8] = b"\x1eTYPEDWIRE\x1e";

/// Message signaling that the sender has nothing more to send.
pub const EOF_SENTINEL: &[u8] = b"EOF!!!";

/// Default single-message limit for chunked transfer: 64 KiB.
pub const DEFAULT_MAX_CHUNK: usize = 64 * 1024;

/// Largest payload accepted through a chunked transfer.
pub const DEFAULT_MAX_MESSAGE: usize = 1024 * DEFAULT_MAX_CHUNK;

/// Header keys owned by the framing layer.
pub const RESERVED_KEYS: [&str; 2] = ["size", "data"];

/// Encode a framed message.
///
/// Wire format:
/// ```text
/// ┌───────────────┬──────────────────┬───────────────┬──────────────┐
/// │ HEADER_MARKER │ metadata (JSON,  │ HEADER_MARKER │ payload      │
/// │ (11B)         │ sorted keys)     │ (11B)         │ (size bytes) │
/// └───────────────┴──────────────────┴───────────────┴──────────────┘
/// ```
pub fn encode_message(metadata: &Metadata, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let sorted: BTreeMap<&String, &JsonValue> = metadata.iter().collect();
    let header = serde_json::to_vec(&sorted)?;

    dst.reserve(2 * HEADER_MARKER.len() + header.len() + payload.len());
    dst.put_slice(HEADER_MARKER);
    dst.put_slice(&header);
    dst.put_slice(HEADER_MARKER);
    dst.put_slice(payload);
    Ok(())
}

/// Whether `msg` begins with a metadata header.
pub fn is_framed(msg: &[u8]) -> bool {
    msg.starts_with(HEADER_MARKER)
}

/// Split a framed message into its metadata and payload.
///
/// Returns `Ok(None)` for a message without any header marker. A marker
/// anywhere but the start, or a header that is never closed, is a protocol
/// error.
pub fn split_message(msg: &[u8]) -> Result<Option<(Metadata, &[u8])>> {
    if !is_framed(msg) {
        return match find_marker(msg) {
            Some(offset) => Err(FrameError::Protocol(format!(
                "{offset} bytes precede the header marker"
            ))),
            None => Ok(None),
        };
    }

    let rest = &msg[HEADER_MARKER.len()..];
    let end = find_marker(rest)
        .ok_or_else(|| FrameError::Protocol("header marker is never closed".to_string()))?;
    let metadata: Metadata = serde_json::from_slice(&rest[..end])?;
    Ok(Some((metadata, &rest[end + HEADER_MARKER.len()..])))
}

/// Parse the decimal length message that opens a chunked transfer.
pub fn parse_length(msg: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(msg).ok()?.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn find_marker(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(HEADER_MARKER.len())
        .position(|window| window == HEADER_MARKER)
}
