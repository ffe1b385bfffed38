//! Leaving a room.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};
use turnroom_protocol::{PlayerId, RoomId};
use turnroom_store::Backend;

use crate::Synchronizer;

/// How the remote leave call went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveRemote {
    /// The backend removed the player.
    Confirmed,
    /// The call failed; the player may linger on the roster.
    Failed,
    /// Another leave was already in flight, so none was sent.
    Skipped,
}

/// How a room session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// The local player left.
    Left { remote: LeaveRemote },
    /// The room was deleted under the player.
    RoomDeleted,
}

/// Leaves one room on behalf of one player.
///
/// Clones share the in-flight guard, so a leave triggered from two places
/// at once (a back button and a window close, say) reaches the backend
/// only once.
#[derive(Debug)]
pub struct Teardown<B> {
    backend: Arc<B>,
    room_id: RoomId,
    player_id: PlayerId,
    in_flight: Arc<AtomicBool>,
}

impl<B> Clone for Teardown<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            room_id: self.room_id.clone(),
            player_id: self.player_id.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

/// Clears the in-flight flag even if the leave future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<B: Backend> Teardown<B> {
    pub fn new(backend: Arc<B>, room_id: RoomId, player_id: PlayerId) -> Self {
        Self {
            backend,
            room_id,
            player_id,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Asks the backend to remove the player. Never fails from the
    /// caller's view; failures are logged and reported as
    /// [`LeaveRemote::Failed`].
    pub async fn leave_remote(&self) -> LeaveRemote {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return LeaveRemote::Skipped;
        }
        let _guard = InFlight(&self.in_flight);

        match self.backend.leave_room(&self.room_id, &self.player_id).await {
            Ok(()) => {
                info!(room_id = %self.room_id, player_id = %self.player_id, "left room");
                LeaveRemote::Confirmed
            }
            Err(e) => {
                warn!(
                    room_id = %self.room_id,
                    player_id = %self.player_id,
                    error = %e,
                    "leave_room failed"
                );
                LeaveRemote::Failed
            }
        }
    }

    /// Leaves the room and disconnects `sync`, whatever the remote outcome.
    pub async fn leave(&self, sync: &mut Synchronizer<B>) -> SessionExit {
        let remote = self.leave_remote().await;
        sync.disconnect();
        SessionExit::Left { remote }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use turnroom_protocol::{RoomCode, RoomState};
    use turnroom_store::{MemoryStore, RoomStore};

    use super::*;

    async fn seated_room(store: &MemoryStore, players: &[&str]) -> RoomId {
        let room = store.insert_room(&RoomCode::normalize("BYE222")).await.unwrap();
        let mut state = RoomState::initial();
        for (i, id) in players.iter().enumerate() {
            state = state.with_player(&PlayerId::new(*id), i == 0).unwrap();
        }
        store.init_state(&room.id, &state).await.unwrap();
        room.id
    }

    fn teardown(store: &MemoryStore, room_id: &RoomId, player: &str) -> Teardown<MemoryStore> {
        Teardown::new(Arc::new(store.clone()), room_id.clone(), PlayerId::new(player))
    }

    #[tokio::test]
    async fn test_leave_remote_confirmed() {
        let store = MemoryStore::new();
        let room_id = seated_room(&store, &["a", "b"]).await;

        let remote = teardown(&store, &room_id, "b").leave_remote().await;

        assert_eq!(remote, LeaveRemote::Confirmed);
        assert!(!store.state(&room_id).unwrap().contains(&PlayerId::new("b")));
    }

    #[tokio::test]
    async fn test_leave_remote_failure_is_reported_not_raised() {
        let store = MemoryStore::new();
        let room_id = seated_room(&store, &["a"]).await;
        store.fail_next_leave("500");

        let remote = teardown(&store, &room_id, "a").leave_remote().await;

        assert_eq!(remote, LeaveRemote::Failed);
        assert_eq!(store.room_count(), 1);
    }

    #[tokio::test]
    async fn test_leave_remote_in_flight_is_skipped() {
        let store = MemoryStore::new();
        let room_id = seated_room(&store, &["a"]).await;
        let first = teardown(&store, &room_id, "a");
        let second = first.clone();
        first.in_flight.store(true, Ordering::Release);

        assert_eq!(second.leave_remote().await, LeaveRemote::Skipped);
        assert_eq!(store.room_count(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_clears_after_leave() {
        let store = MemoryStore::new();
        let room_id = seated_room(&store, &["a", "b"]).await;
        let handle = teardown(&store, &room_id, "a");

        handle.leave_remote().await;

        assert!(!handle.is_in_flight());
    }
}
