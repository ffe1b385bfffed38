//! Error types for the session layer.

/// Errors that can occur handling device-local session state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The key-value store refused a read or write.
    #[error("local storage failed: {0}")]
    Storage(String),

    /// A stored record could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] turnroom_protocol::ProtocolError),

    /// A session entry query string is missing a field or has a bad one.
    #[error("invalid session entry: {0}")]
    InvalidEntry(String),
}
