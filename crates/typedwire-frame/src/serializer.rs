use bytes::BytesMut;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;
use typedwire_types::{Codec, CodecError, Metadata, Typedef, Value};
use uuid::Uuid;

use crate::codec::{encode_message, split_message, EOF_SENTINEL, RESERVED_KEYS};
use crate::error::{FrameError, Result};

/// Turns values into framed messages and back.
///
/// A serializer may be bound to a typedef. Values are then encoded as that
/// type and received data is decoded into it; unframed messages are accepted
/// only when the typedef describes raw bytes.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    codec: Codec,
    typedef: Option<Typedef>,
}

impl Serializer {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            typedef: None,
        }
    }

    pub fn with_typedef(codec: Codec, typedef: Typedef) -> Self {
        Self {
            codec,
            typedef: Some(typedef),
        }
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn typedef(&self) -> Option<&Typedef> {
        self.typedef.as_ref()
    }

    /// Whether this serializer carries raw bytes, which may arrive unframed.
    pub fn is_bytes(&self) -> bool {
        let Some(typedef) = &self.typedef else {
            return false;
        };
        match typedef.type_name() {
            "bytes" => true,
            "scalar" => typedef.get("subtype").and_then(JsonValue::as_str) == Some("bytes"),
            _ => false,
        }
    }

    /// Serialize `value` into a framed message.
    ///
    /// `header` keys are merged into the derived metadata; a key that
    /// disagrees with the derived value is an encode error. The EOF
    /// sentinel, and any bytes value sent with `raw: true`, pass through
    /// unframed.
    pub fn serialize(&self, value: &Value, header: Option<&Map<String, JsonValue>>) -> Result<Vec<u8>> {
        if let Some(header) = header {
            if let Some(key) = RESERVED_KEYS.iter().find(|key| header.contains_key(**key)) {
                return Err(FrameError::ReservedKey((*key).to_string()));
            }
        }

        if let Value::Bytes(bytes) = value {
            let raw = header
                .and_then(|h| h.get("raw"))
                .and_then(JsonValue::as_bool)
                .unwrap_or(false);
            if raw || bytes.as_slice() == EOF_SENTINEL {
                debug!(size = bytes.len(), "passing raw bytes through unframed");
                return Ok(bytes.clone());
            }
        }

        let (mut metadata, payload) = self.codec.encode(value, self.typedef.as_ref())?;
        if let Some(header) = header {
            merge_header(&mut metadata, header, value)?;
        }
        metadata.insert("size".to_string(), JsonValue::from(payload.len()));
        metadata.insert("id".to_string(), JsonValue::from(Uuid::new_v4().to_string()));

        let mut buf = BytesMut::new();
        encode_message(&metadata, &payload, &mut buf)?;
        debug!(
            type_name = metadata.type_name().unwrap_or_default(),
            size = payload.len(),
            "serialized message"
        );
        Ok(buf.to_vec())
    }

    /// The message announcing end of stream.
    pub fn serialize_eof(&self) -> Vec<u8> {
        EOF_SENTINEL.to_vec()
    }

    /// Deserialize a message into a value and its metadata.
    ///
    /// `metadata` supplies the header for an unframed message; giving it for
    /// a framed one is a protocol error. Sets `incomplete` when fewer bytes
    /// arrived than the header announced. Incomplete and raw payloads are
    /// returned as [`Value::Bytes`].
    pub fn deserialize(&self, msg: &[u8], metadata: Option<&Metadata>) -> Result<(Value, Metadata)> {
        let (metadata, payload) = self.unframe(msg, metadata)?;
        if metadata.is_eof() || metadata.is_raw() || metadata.incomplete() {
            return Ok((Value::Bytes(payload.to_vec()), metadata));
        }
        if payload.is_empty() {
            let value = self.empty_value(&metadata);
            return Ok((value, metadata));
        }

        let value = self.codec.decode(&metadata, payload, self.typedef.as_ref())?;
        debug!(
            type_name = metadata.type_name().unwrap_or_default(),
            size = payload.len(),
            "deserialized message"
        );
        Ok((value, metadata))
    }

    /// Split a message into its payload and metadata without decoding.
    pub fn deserialize_raw(&self, msg: &[u8], metadata: Option<&Metadata>) -> Result<(Vec<u8>, Metadata)> {
        let (mut metadata, payload) = self.unframe(msg, metadata)?;
        metadata.insert("raw".to_string(), JsonValue::Bool(true));
        Ok((payload.to_vec(), metadata))
    }

    fn unframe<'a>(&self, msg: &'a [u8], supplied: Option<&Metadata>) -> Result<(Metadata, &'a [u8])> {
        let (mut metadata, payload) = match split_message(msg)? {
            Some(_) if supplied.is_some() => {
                return Err(FrameError::Protocol(
                    "metadata given both in the message header and by the caller".to_string(),
                ));
            }
            Some((metadata, payload)) => (metadata, payload),
            None => {
                let mut metadata = match supplied {
                    Some(metadata) => metadata.clone(),
                    None if msg.is_empty() || msg == EOF_SENTINEL || self.is_bytes() => self.default_metadata(),
                    None => return Err(FrameError::MissingMarker),
                };
                if supplied.is_none() && !msg.is_empty() {
                    metadata.insert("raw".to_string(), JsonValue::Bool(true));
                }
                (metadata, msg)
            }
        };

        if payload == EOF_SENTINEL {
            metadata.insert("eof".to_string(), JsonValue::Bool(true));
            metadata.insert("raw".to_string(), JsonValue::Bool(true));
        }
        let size = match metadata.size() {
            Some(size) => usize::try_from(size).unwrap_or(usize::MAX),
            None => {
                metadata.insert("size".to_string(), JsonValue::from(payload.len()));
                payload.len()
            }
        };
        metadata.insert("incomplete".to_string(), JsonValue::Bool(payload.len() < size));
        Ok((metadata, payload))
    }

    fn default_metadata(&self) -> Metadata {
        self.typedef
            .as_ref()
            .map(|typedef| Metadata::from_map(typedef.as_map().clone()))
            .unwrap_or_default()
    }

    fn empty_value(&self, metadata: &Metadata) -> Value {
        if metadata.type_name().is_some() {
            return self.codec.empty_value(metadata);
        }
        self.codec.empty_value(&self.default_metadata())
    }
}

fn merge_header(metadata: &mut Metadata, header: &Map<String, JsonValue>, value: &Value) -> Result<()> {
    for (key, explicit) in header {
        match metadata.get(key) {
            Some(found) if found != explicit => {
                return Err(CodecError::Encode {
                    type_name: metadata.type_name().unwrap_or_default().to_string(),
                    value: format!("{value:?}"),
                    violations: vec![format!(
                        "header '{key}' = {explicit} conflicts with encoded {found}"
                    )],
                }
                .into());
            }
            Some(_) => {}
            None => {
                metadata.insert(key.clone(), explicit.clone());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use typedwire_types::{Scalar, TypeRegistry};

    use super::*;
    use crate::codec::HEADER_MARKER;

    fn codec() -> Codec {
        Codec::new(Arc::new(TypeRegistry::with_builtins()))
    }

    fn serializer() -> Serializer {
        Serializer::new(codec())
    }

    fn typed(value: JsonValue) -> Serializer {
        Serializer::with_typedef(codec(), Typedef::from_json(value).unwrap())
    }

    fn header(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn roundtrip_injects_size_and_id() {
        let s = serializer();
        let msg = s.serialize(&Value::Integer(42), None).unwrap();
        assert!(msg.starts_with(HEADER_MARKER));

        let (value, metadata) = s.deserialize(&msg, None).unwrap();
        assert_eq!(value, Value::Integer(42));
        assert_eq!(metadata.type_name(), Some("integer"));
        assert_eq!(metadata.size(), Some(2));
        assert!(metadata.id().is_some_and(|id| Uuid::parse_str(id).is_ok()));
        assert!(!metadata.incomplete());
    }

    #[test]
    fn every_message_gets_a_fresh_id() {
        let s = serializer();
        let (_, a) = s.deserialize(&s.serialize(&Value::Null, None).unwrap(), None).unwrap();
        let (_, b) = s.deserialize(&s.serialize(&Value::Null, None).unwrap(), None).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn framing_is_idempotent() {
        let s = serializer();
        let original = Value::from(vec![Value::from("a"), Value::Integer(2)]);

        let first = s.serialize(&original, None).unwrap();
        let (value, mut first_meta) = s.deserialize(&first, None).unwrap();
        let second = s.serialize(&value, None).unwrap();
        let (again, mut second_meta) = s.deserialize(&second, None).unwrap();

        assert_eq!(again, original);
        first_meta.remove("id");
        second_meta.remove("id");
        assert_eq!(first_meta, second_meta);
        let (_, first_payload) = split_message(&first).unwrap().unwrap();
        let (_, second_payload) = split_message(&second).unwrap().unwrap();
        assert_eq!(first_payload, second_payload);
    }

    #[test]
    fn truncated_payload_is_incomplete() {
        let s = serializer();
        let msg = s.serialize(&Value::from("a longer string"), None).unwrap();

        let (value, metadata) = s.deserialize(&msg[..msg.len() - 3], None).unwrap();
        assert!(metadata.incomplete());
        assert_eq!(metadata.size(), Some(17));
        assert!(matches!(value, Value::Bytes(ref b) if b.len() == 14));

        let (value, metadata) = s.deserialize(&msg[..msg.len() - 1], None).unwrap();
        assert!(metadata.incomplete());
        assert!(matches!(value, Value::Bytes(ref b) if b.len() == 16));
    }

    #[test]
    fn scalar_missing_last_byte_is_incomplete() {
        let s = typed(json!({"type": "scalar", "subtype": "float", "precision": 32}));
        let msg = s.serialize(&Value::Number(1.5), None).unwrap();

        let (value, metadata) = s.deserialize(&msg, None).unwrap();
        assert!(!metadata.incomplete());
        assert_eq!(value, Value::Scalar(Scalar::float(1.5, 32)));

        let (value, metadata) = s.deserialize(&msg[..msg.len() - 1], None).unwrap();
        assert!(metadata.incomplete());
        assert_eq!(metadata.size(), Some(4));
        assert_eq!(value, Value::Bytes(1.5f32.to_le_bytes()[..3].to_vec()));
    }

    #[test]
    fn eof_sentinel_passes_through() {
        let s = serializer();
        let msg = s.serialize(&Value::Bytes(EOF_SENTINEL.to_vec()), None).unwrap();
        assert_eq!(msg, EOF_SENTINEL);
        assert_eq!(s.serialize_eof(), EOF_SENTINEL);

        let (value, metadata) = s.deserialize(&msg, None).unwrap();
        assert_eq!(value, Value::Bytes(EOF_SENTINEL.to_vec()));
        assert!(metadata.is_eof());
        assert!(metadata.is_raw());
        assert!(!metadata.incomplete());
    }

    #[test]
    fn eof_sentinel_ignores_declared_typedef() {
        let s = typed(json!({"type": "float"}));
        let msg = s.serialize_eof();
        assert_eq!(msg, EOF_SENTINEL);

        let (value, metadata) = s.deserialize(&msg, None).unwrap();
        assert_eq!(value, Value::Bytes(EOF_SENTINEL.to_vec()));
        assert!(metadata.is_eof());
        assert!(metadata.is_raw());
        assert!(!metadata.incomplete());

        let sent = s.serialize(&Value::Bytes(EOF_SENTINEL.to_vec()), None).unwrap();
        assert_eq!(sent, EOF_SENTINEL);
    }

    #[test]
    fn raw_header_skips_framing() {
        let s = serializer();
        let msg = s
            .serialize(&Value::Bytes(b"raw!".to_vec()), Some(&header(json!({"raw": true}))))
            .unwrap();
        assert_eq!(msg, b"raw!");
    }

    #[test]
    fn reserved_header_keys() {
        let s = serializer();
        for key in RESERVED_KEYS {
            let err = s
                .serialize(&Value::Integer(1), Some(&header(json!({ key: 1 }))))
                .unwrap_err();
            assert!(matches!(err, FrameError::ReservedKey(ref k) if k == key));
        }
    }

    #[test]
    fn header_keys_are_merged() {
        let s = serializer();
        let msg = s
            .serialize(&Value::Integer(1), Some(&header(json!({"source": "sensor-1", "type": "integer"}))))
            .unwrap();
        let (_, metadata) = s.deserialize(&msg, None).unwrap();
        assert_eq!(metadata.get("source"), Some(&json!("sensor-1")));
    }

    #[test]
    fn conflicting_header_is_encode_error() {
        let s = serializer();
        let err = s
            .serialize(&Value::Integer(1), Some(&header(json!({"type": "string"}))))
            .unwrap_err();
        assert!(matches!(err, FrameError::Codec(CodecError::Encode { .. })));
    }

    #[test]
    fn unframed_message_requires_bytes_serializer() {
        assert!(matches!(
            serializer().deserialize(b"abc", None),
            Err(FrameError::MissingMarker)
        ));

        let (value, metadata) = typed(json!({"type": "bytes"})).deserialize(b"abc", None).unwrap();
        assert_eq!(value, Value::Bytes(b"abc".to_vec()));
        assert!(metadata.is_raw());
    }

    #[test]
    fn caller_metadata_decodes_unframed_payload() {
        let s = serializer();
        let metadata = Metadata::from_json(json!({"type": "string"})).unwrap();
        let (value, metadata) = s.deserialize(b"\"hi\"", Some(&metadata)).unwrap();
        assert_eq!(value, Value::from("hi"));
        assert_eq!(metadata.size(), Some(4));
    }

    #[test]
    fn metadata_twice_is_protocol_error() {
        let s = serializer();
        let msg = s.serialize(&Value::Integer(1), None).unwrap();
        let metadata = Metadata::from_json(json!({"type": "integer"})).unwrap();
        assert!(matches!(
            s.deserialize(&msg, Some(&metadata)),
            Err(FrameError::Protocol(_))
        ));
    }

    #[test]
    fn empty_payload_is_empty_value() {
        let s = serializer();
        let metadata = Metadata::from_json(json!({"type": "array", "items": [], "size": 0})).unwrap();
        let mut msg = BytesMut::new();
        encode_message(&metadata, b"", &mut msg).unwrap();

        let (value, _) = s.deserialize(&msg, None).unwrap();
        assert_eq!(value, Value::Array(vec![]));

        let (value, metadata) = s.deserialize(b"", None).unwrap();
        assert_eq!(value, Value::Null);
        assert!(!metadata.is_raw());

        let (value, _) = typed(json!({"type": "bytes"})).deserialize(b"", None).unwrap();
        assert_eq!(value, Value::Bytes(vec![]));
    }

    #[test]
    fn typed_serializer_converts_units() {
        let sender = typed(json!({"type": "scalar", "subtype": "float", "precision": 32, "units": "cm"}));
        let receiver = typed(json!({"type": "scalar", "subtype": "float", "precision": 32, "units": "m"}));

        let msg = sender.serialize(&Value::Number(2.5), None).unwrap();
        let (value, metadata) = receiver.deserialize(&msg, None).unwrap();

        assert_eq!(metadata.size(), Some(4));
        assert_eq!(metadata.get("units"), Some(&json!("cm")));
        assert_eq!(value, Value::Scalar(Scalar::float(0.025, 32).with_units("m")));
    }

    #[test]
    fn raw_deserialize_skips_decoding() {
        let s = serializer();
        let msg = s.serialize(&Value::from("text"), None).unwrap();
        let (payload, metadata) = s.deserialize_raw(&msg, None).unwrap();
        assert_eq!(payload, b"\"text\"");
        assert!(metadata.is_raw());
        assert_eq!(metadata.type_name(), Some("string"));
    }
}
