//! Error types for the room layer.

use turnroom_protocol::{RoomCode, RoomId};
use turnroom_store::StoreError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Every generated code collided with an existing room.
    #[error("could not create a room after {attempts} attempts (code collisions)")]
    RoomCreationExhausted { attempts: u32 },

    /// The room record was created but its state document was not. The
    /// registry has already tried to delete the orphaned record.
    #[error("room {room_id} created but its state could not be initialized")]
    RoomStateInitFailed {
        room_id: RoomId,
        #[source]
        source: StoreError,
    },

    /// No room matches the code.
    #[error("no room with code {0}")]
    RoomNotFound(RoomCode),

    /// The state document could not be fetched.
    #[error("failed to read room state")]
    StateReadFailed(#[source] StoreError),

    /// The state document could not be written.
    #[error("failed to write room state")]
    StateWriteFailed(#[source] StoreError),

    /// The operation needs a synchronized room.
    #[error("not synchronized with a room")]
    NotSynced,

    /// Only the host may do this.
    #[error("only the host may advance the turn")]
    NotHost,

    /// Any other backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
