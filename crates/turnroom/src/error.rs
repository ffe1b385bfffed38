//! Unified error type for Turnroom.

use turnroom_protocol::ProtocolError;
use turnroom_room::RoomError;
use turnroom_session::SessionError;
use turnroom_store::StoreError;

/// Top-level error wrapping every layer's error.
///
/// The `#[from]` conversions let `?` lift layer errors unchanged.
#[derive(Debug, thiserror::Error)]
pub enum TurnroomError {
    /// A backend call failed (records, procedures, change feed).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A code or document failed to parse or encode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Device-local state could not be read or written.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room operation failed (not found, not synced, not host).
    #[error(transparent)]
    Room(#[from] RoomError),
}
