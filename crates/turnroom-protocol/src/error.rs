//! Error types for the protocol layer.
//!
//! Each Turnroom crate owns its error enum. A `ProtocolError` always means
//! the problem is in the data itself (malformed bytes, an invalid code),
//! never in the store or the network.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Common causes: malformed JSON, missing required fields, or a
    /// record written by an incompatible version.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A room code has the wrong length or contains symbols outside
    /// [`CODE_ALPHABET`].
    ///
    /// [`CODE_ALPHABET`]: crate::CODE_ALPHABET
    #[error("invalid room code: {0:?}")]
    InvalidCode(String),
}
