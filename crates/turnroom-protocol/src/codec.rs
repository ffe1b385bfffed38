//! Codec trait and implementations for serializing room documents.
//!
//! The same codec serves two places: the WebSocket change feed (frames on
//! the wire) and local persistence (profiles written to a key-value
//! store). Neither caller cares about the format, only that something
//! implements [`Codec`].

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because codecs live inside long-running tokio
/// tasks (the feed relay) and are shared between them.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do
    /// not match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// JSON keeps persisted profiles and feed frames readable in browser
/// storage inspectors and relay logs.
///
/// ```rust
/// use turnroom_protocol::{Codec, FeedFrame, JsonCodec, RoomId};
///
/// let codec = JsonCodec;
/// let frame = FeedFrame::Subscribe { room_id: RoomId::new("r-1") };
///
/// let bytes = codec.encode(&frame).unwrap();
/// let decoded: FeedFrame = codec.decode(&bytes).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{PlayerId, RoomState};

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<RoomState, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_encodes_state_as_camel_case() {
        let state = RoomState::initial()
            .with_player(&PlayerId::new("p-1"), true)
            .expect("player is new");

        let bytes = JsonCodec.encode(&state).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("\"hostId\":\"p-1\""), "got {text}");
    }
}
