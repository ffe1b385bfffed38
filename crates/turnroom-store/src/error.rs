use turnroom_protocol::{ProtocolError, RoomCode, RoomId, RoomState};

/// Errors that can occur talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No room record with this id (or it has no state document).
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// No room record with this code.
    #[error("no room with code {0}")]
    CodeNotFound(RoomCode),

    /// Another room already uses the code. The caller may retry with a
    /// different code.
    #[error("room code {0} already taken")]
    CodeTaken(RoomCode),

    /// A conditional write found a newer document than expected.
    #[error("version conflict: expected {expected}, store has {}", .current.version)]
    Conflict {
        expected: u64,
        current: Box<RoomState>,
    },

    /// The backend refused or failed the request (network, timeout,
    /// server error).
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The change feed connection failed.
    #[error("change feed failed: {0}")]
    Feed(String),

    /// A frame or record could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
