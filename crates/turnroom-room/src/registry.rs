//! Room creation.

use std::sync::Arc;

use tracing::{debug, info, warn};
use turnroom_protocol::{Room, RoomCode, RoomState};
use turnroom_store::{RoomStore, StoreError};

use crate::{RoomConfig, RoomError};

/// Creates rooms with unique codes and their initial state document.
#[derive(Debug)]
pub struct RoomRegistry<S> {
    store: Arc<S>,
    config: RoomConfig,
}

impl<S> Clone for RoomRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: RoomStore> RoomRegistry<S> {
    pub fn new(store: Arc<S>, config: RoomConfig) -> Self {
        Self {
            store,
            config: config.validated(),
        }
    }

    /// Creates a room.
    ///
    /// Each attempt generates a fresh code and inserts it; a collision
    /// moves on to the next attempt. Once a record is in, its state is
    /// initialized to [`RoomState::initial`].
    ///
    /// # Errors
    /// - [`RoomError::RoomCreationExhausted`] if every attempt collided
    /// - [`RoomError::RoomStateInitFailed`] if the state document could not
    ///   be created; the orphaned record is deleted on a best-effort basis
    /// - [`RoomError::Store`] for any non-collision insert failure
    pub async fn create_room(&self) -> Result<Room, RoomError> {
        let attempts = self.config.max_create_attempts;

        for attempt in 1..=attempts {
            let code = RoomCode::generate(self.config.code_length);
            let room = match self.store.insert_room(&code).await {
                Ok(room) => room,
                Err(StoreError::CodeTaken(code)) => {
                    debug!(attempt, %code, "room code taken, retrying");
                    continue;
                }
                Err(e) => return Err(RoomError::Store(e)),
            };

            if let Err(e) = self.store.init_state(&room.id, &RoomState::initial()).await {
                warn!(room_id = %room.id, error = %e, "room state init failed, deleting orphaned room");
                if let Err(cleanup) = self.store.delete_room(&room.id).await {
                    warn!(room_id = %room.id, error = %cleanup, "orphaned room cleanup failed");
                }
                return Err(RoomError::RoomStateInitFailed {
                    room_id: room.id,
                    source: e,
                });
            }

            info!(room_id = %room.id, code = %room.code, attempt, "room created");
            return Ok(room);
        }

        warn!(attempts, "room creation exhausted");
        Err(RoomError::RoomCreationExhausted { attempts })
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use turnroom_store::MemoryStore;

    use super::*;

    fn registry(store: &MemoryStore) -> RoomRegistry<MemoryStore> {
        RoomRegistry::new(Arc::new(store.clone()), RoomConfig::default())
    }

    #[tokio::test]
    async fn test_create_room_initializes_state() {
        let store = MemoryStore::new();

        let room = registry(&store).create_room().await.unwrap();

        assert!(room.code.is_well_formed(6));
        assert_eq!(store.state(&room.id), Some(RoomState::initial()));
    }

    #[tokio::test]
    async fn test_create_room_codes_are_distinct() {
        let store = MemoryStore::new();
        let registry = registry(&store);

        let a = registry.create_room().await.unwrap();
        let b = registry.create_room().await.unwrap();

        assert_ne!(a.code, b.code);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_create_room_succeeds_after_four_collisions() {
        let store = MemoryStore::new();
        store.collide_next_inserts(4);

        let result = registry(&store).create_room().await;

        assert!(result.is_ok());
        assert_eq!(store.room_count(), 1);
    }

    #[tokio::test]
    async fn test_create_room_five_collisions_exhausts() {
        let store = MemoryStore::new();
        store.collide_next_inserts(5);

        let result = registry(&store).create_room().await;

        assert!(matches!(
            result,
            Err(RoomError::RoomCreationExhausted { attempts: 5 })
        ));
        assert_eq!(store.room_count(), 0);
    }

    #[tokio::test]
    async fn test_create_room_init_failure_deletes_orphan() {
        let store = MemoryStore::new();
        store.fail_next_init_state("permission denied");

        let result = registry(&store).create_room().await;

        assert!(matches!(result, Err(RoomError::RoomStateInitFailed { .. })));
        assert_eq!(store.room_count(), 0);
    }
}
