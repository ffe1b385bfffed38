//! In-process backend.
//!
//! Behaves like the hosted store the client normally talks to: atomic
//! code uniqueness, versioned state writes, roster-driven room deletion,
//! and per-room change fan-out. Fault injection hooks let tests exercise
//! the failure paths of the room layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use turnroom_protocol::{ChangeEvent, PlayerId, Room, RoomCode, RoomId, RoomState};

use crate::{ChangeFeed, RemoteProcedures, RoomStore, StoreError, Subscription, SubscriptionSender};

/// A shareable in-memory backend. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    rooms: HashMap<RoomId, Room>,
    codes: HashMap<RoomCode, RoomId>,
    states: HashMap<RoomId, RoomState>,
    watchers: HashMap<RoomId, Vec<SubscriptionSender>>,

    // Fault injection.
    collide_inserts: usize,
    fail_init: Option<String>,
    fail_read: Option<String>,
    fail_write: Option<String>,
    fail_leave: Option<String>,
    fail_subscribe: Option<String>,
}

impl MemoryInner {
    /// Pushes `event` to every live watcher of `room_id`, pruning the
    /// ones whose subscription has gone away.
    fn notify(&mut self, room_id: &RoomId, event: &ChangeEvent) {
        if let Some(watchers) = self.watchers.get_mut(room_id) {
            watchers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Drops senders whose subscription was cancelled or dropped.
    fn prune_watchers(&mut self) {
        self.watchers.retain(|_, watchers| {
            watchers.retain(|tx| !tx.is_closed());
            !watchers.is_empty()
        });
    }

    fn remove_room(&mut self, room_id: &RoomId) -> bool {
        let Some(room) = self.rooms.remove(room_id) else {
            return false;
        };
        self.codes.remove(&room.code);
        self.states.remove(room_id);
        self.notify(room_id, &ChangeEvent::Deleted);
        // Ends every open subscription on this room.
        self.watchers.remove(room_id);
        true
    }

    fn live_room(&self, code: &RoomCode) -> Option<RoomId> {
        self.codes
            .get(code)
            .filter(|id| self.states.contains_key(*id))
            .cloned()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Inspection --

    pub fn room_count(&self) -> usize {
        self.inner().rooms.len()
    }

    pub fn room(&self, room_id: &RoomId) -> Option<Room> {
        self.inner().rooms.get(room_id).cloned()
    }

    /// Snapshot of a room's state document.
    pub fn state(&self, room_id: &RoomId) -> Option<RoomState> {
        self.inner().states.get(room_id).cloned()
    }

    /// Number of live subscriptions on a room.
    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        self.inner()
            .watchers
            .get(room_id)
            .map_or(0, |w| w.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Senders held for all rooms, including ones whose subscription has
    /// ended but has not been pruned yet.
    pub fn watcher_slots(&self) -> usize {
        self.inner().watchers.values().map(Vec::len).sum()
    }

    // -- Fault injection --

    /// The next `n` inserts report a code collision.
    pub fn collide_next_inserts(&self, n: usize) {
        self.inner().collide_inserts = n;
    }

    pub fn fail_next_init_state(&self, reason: &str) {
        self.inner().fail_init = Some(reason.to_string());
    }

    pub fn fail_next_read(&self, reason: &str) {
        self.inner().fail_read = Some(reason.to_string());
    }

    pub fn fail_next_write(&self, reason: &str) {
        self.inner().fail_write = Some(reason.to_string());
    }

    pub fn fail_next_leave(&self, reason: &str) {
        self.inner().fail_leave = Some(reason.to_string());
    }

    pub fn fail_next_subscribe(&self, reason: &str) {
        self.inner().fail_subscribe = Some(reason.to_string());
    }
}

impl RoomStore for MemoryStore {
    async fn insert_room(&self, code: &RoomCode) -> Result<Room, StoreError> {
        let mut inner = self.inner();
        if inner.collide_inserts > 0 {
            inner.collide_inserts -= 1;
            return Err(StoreError::CodeTaken(code.clone()));
        }
        if inner.codes.contains_key(code) {
            return Err(StoreError::CodeTaken(code.clone()));
        }

        let room = Room {
            id: RoomId::generate(),
            code: code.clone(),
        };
        inner.codes.insert(code.clone(), room.id.clone());
        inner.rooms.insert(room.id.clone(), room.clone());
        tracing::debug!(room_id = %room.id, %code, "room inserted");
        Ok(room)
    }

    async fn init_state(&self, room_id: &RoomId, state: &RoomState) -> Result<(), StoreError> {
        let mut inner = self.inner();
        if let Some(reason) = inner.fail_init.take() {
            return Err(StoreError::Unavailable(reason));
        }
        if !inner.rooms.contains_key(room_id) {
            return Err(StoreError::RoomNotFound(room_id.clone()));
        }
        if let Some(current) = inner.states.get(room_id) {
            return Err(StoreError::Conflict {
                expected: state.version,
                current: Box::new(current.clone()),
            });
        }

        inner.states.insert(room_id.clone(), state.clone());
        inner.notify(room_id, &ChangeEvent::Inserted(state.clone()));
        Ok(())
    }

    async fn find_room_by_code(&self, code: &RoomCode) -> Result<Option<Room>, StoreError> {
        let inner = self.inner();
        Ok(inner
            .codes
            .get(code)
            .and_then(|id| inner.rooms.get(id))
            .cloned())
    }

    async fn read_state(&self, room_id: &RoomId) -> Result<RoomState, StoreError> {
        let mut inner = self.inner();
        if let Some(reason) = inner.fail_read.take() {
            return Err(StoreError::Unavailable(reason));
        }
        inner
            .states
            .get(room_id)
            .cloned()
            .ok_or_else(|| StoreError::RoomNotFound(room_id.clone()))
    }

    async fn write_state(
        &self,
        room_id: &RoomId,
        state: &RoomState,
        expected_version: Option<u64>,
    ) -> Result<RoomState, StoreError> {
        let mut inner = self.inner();
        if let Some(reason) = inner.fail_write.take() {
            return Err(StoreError::Unavailable(reason));
        }
        let Some(current) = inner.states.get(room_id) else {
            return Err(StoreError::RoomNotFound(room_id.clone()));
        };
        if let Some(expected) = expected_version {
            if current.version != expected {
                return Err(StoreError::Conflict {
                    expected,
                    current: Box::new(current.clone()),
                });
            }
        }

        let stored = RoomState {
            version: current.version + 1,
            ..state.clone()
        };
        inner.states.insert(room_id.clone(), stored.clone());
        inner.notify(room_id, &ChangeEvent::Updated(stored.clone()));
        tracing::trace!(%room_id, version = stored.version, turn = stored.turn, "state written");
        Ok(stored)
    }

    async fn delete_room(&self, room_id: &RoomId) -> Result<(), StoreError> {
        if self.inner().remove_room(room_id) {
            tracing::debug!(%room_id, "room deleted");
            Ok(())
        } else {
            Err(StoreError::RoomNotFound(room_id.clone()))
        }
    }
}

impl RemoteProcedures for MemoryStore {
    async fn join_room(&self, code: &RoomCode) -> Result<RoomId, StoreError> {
        self.inner()
            .codes
            .get(code)
            .cloned()
            .ok_or_else(|| StoreError::CodeNotFound(code.clone()))
    }

    async fn join_room_existing(&self, code: &RoomCode) -> Result<Option<RoomId>, StoreError> {
        Ok(self.inner().live_room(code))
    }

    async fn leave_room(&self, room_id: &RoomId, player_id: &PlayerId) -> Result<(), StoreError> {
        let mut inner = self.inner();
        if let Some(reason) = inner.fail_leave.take() {
            return Err(StoreError::Unavailable(reason));
        }
        let Some(current) = inner.states.get(room_id) else {
            return Err(StoreError::RoomNotFound(room_id.clone()));
        };

        let mut next = current.clone();
        next.players.retain(|p| &p.id != player_id);
        let removed = next.players.len() != current.players.len();
        next.version = current.version + 1;

        if next.players.is_empty() {
            inner.remove_room(room_id);
            tracing::debug!(%room_id, %player_id, "last player left, room deleted");
            return Ok(());
        }
        if removed {
            inner.states.insert(room_id.clone(), next.clone());
            inner.notify(room_id, &ChangeEvent::Updated(next));
            tracing::debug!(%room_id, %player_id, "player left");
        }
        Ok(())
    }
}

impl ChangeFeed for MemoryStore {
    async fn subscribe(&self, room_id: &RoomId) -> Result<Subscription, StoreError> {
        let mut inner = self.inner();
        if let Some(reason) = inner.fail_subscribe.take() {
            return Err(StoreError::Feed(reason));
        }
        if !inner.rooms.contains_key(room_id) {
            return Err(StoreError::RoomNotFound(room_id.clone()));
        }
        inner.prune_watchers();
        let (tx, sub) = Subscription::channel(room_id.clone());
        inner.watchers.entry(room_id.clone()).or_default().push(tx);
        Ok(sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> RoomCode {
        RoomCode::normalize(raw)
    }

    async fn live_room(store: &MemoryStore, raw: &str) -> Room {
        let room = store.insert_room(&code(raw)).await.unwrap();
        store
            .init_state(&room.id, &RoomState::initial())
            .await
            .unwrap();
        room
    }

    // =====================================================================
    // Rooms and codes
    // =====================================================================

    #[tokio::test]
    async fn test_insert_room_duplicate_code_is_taken() {
        let store = MemoryStore::new();
        store.insert_room(&code("ABCDEF")).await.unwrap();

        let result = store.insert_room(&code("ABCDEF")).await;

        assert!(matches!(result, Err(StoreError::CodeTaken(_))));
        assert_eq!(store.room_count(), 1);
    }

    #[tokio::test]
    async fn test_collide_next_inserts_counts_down() {
        let store = MemoryStore::new();
        store.collide_next_inserts(2);

        assert!(store.insert_room(&code("AAAAAA")).await.is_err());
        assert!(store.insert_room(&code("BBBBBB")).await.is_err());
        assert!(store.insert_room(&code("CCCCCC")).await.is_ok());
    }

    #[tokio::test]
    async fn test_find_room_by_code_exact_match() {
        let store = MemoryStore::new();
        let room = live_room(&store, "K7MQ2Z").await;

        let found = store.find_room_by_code(&code("k7mq2z")).await.unwrap();
        assert_eq!(found, Some(room));

        let missing = store.find_room_by_code(&code("ZZZZZZ")).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_join_room_existing_skips_rooms_without_state() {
        let store = MemoryStore::new();
        let orphan = store.insert_room(&code("ORPHAN")).await.unwrap();

        assert_eq!(store.join_room_existing(&code("ORPHAN")).await.unwrap(), None);
        assert_eq!(store.join_room(&code("ORPHAN")).await.unwrap(), orphan.id);
    }

    #[tokio::test]
    async fn test_join_room_unknown_code_returns_code_not_found() {
        let store = MemoryStore::new();
        let result = store.join_room(&code("NOPE22")).await;
        assert!(matches!(result, Err(StoreError::CodeNotFound(_))));
    }

    // =====================================================================
    // Versioned writes
    // =====================================================================

    #[tokio::test]
    async fn test_write_state_bumps_version() {
        let store = MemoryStore::new();
        let room = live_room(&store, "ABCDEF").await;

        let first = store
            .write_state(&room.id, &RoomState::initial().advanced(), Some(0))
            .await
            .unwrap();
        let second = store
            .write_state(&room.id, &first.advanced(), Some(first.version))
            .await
            .unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(second.turn, 3);
    }

    #[tokio::test]
    async fn test_write_state_stale_version_conflicts() {
        let store = MemoryStore::new();
        let room = live_room(&store, "ABCDEF").await;
        let base = store.read_state(&room.id).await.unwrap();
        store
            .write_state(&room.id, &base.advanced(), Some(base.version))
            .await
            .unwrap();

        let result = store
            .write_state(&room.id, &base.advanced(), Some(base.version))
            .await;

        match result {
            Err(StoreError::Conflict { expected, current }) => {
                assert_eq!(expected, 0);
                assert_eq!(current.version, 1);
                assert_eq!(current.turn, 2);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_state_unconditional_overwrites() {
        let store = MemoryStore::new();
        let room = live_room(&store, "ABCDEF").await;
        let mut stale = RoomState::initial();
        stale.turn = 9;

        let stored = store.write_state(&room.id, &stale, None).await.unwrap();

        assert_eq!(stored.turn, 9);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_init_state_twice_conflicts() {
        let store = MemoryStore::new();
        let room = live_room(&store, "ABCDEF").await;

        let result = store.init_state(&room.id, &RoomState::initial()).await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    // =====================================================================
    // Leave and deletion
    // =====================================================================

    #[tokio::test]
    async fn test_leave_room_last_player_deletes_room() {
        let store = MemoryStore::new();
        let room = live_room(&store, "ABCDEF").await;
        let a = PlayerId::new("a");
        let seated = RoomState::initial().with_player(&a, true).unwrap();
        store.write_state(&room.id, &seated, None).await.unwrap();
        let mut sub = store.subscribe(&room.id).await.unwrap();

        store.leave_room(&room.id, &a).await.unwrap();

        assert_eq!(store.room_count(), 0);
        assert!(store.find_room_by_code(&code("ABCDEF")).await.unwrap().is_none());
        assert_eq!(sub.next().await, Some(ChangeEvent::Deleted));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_leave_room_keeps_room_while_others_remain() {
        let store = MemoryStore::new();
        let room = live_room(&store, "ABCDEF").await;
        let (a, b) = (PlayerId::new("a"), PlayerId::new("b"));
        let seated = RoomState::initial()
            .with_player(&a, true)
            .unwrap()
            .with_player(&b, false)
            .unwrap();
        store.write_state(&room.id, &seated, None).await.unwrap();

        store.leave_room(&room.id, &b).await.unwrap();

        let state = store.state(&room.id).unwrap();
        assert!(state.contains(&a));
        assert!(!state.contains(&b));
        assert_eq!(state.version, 2);
    }

    // =====================================================================
    // Change feed
    // =====================================================================

    #[tokio::test]
    async fn test_subscribe_receives_commits_in_order() {
        let store = MemoryStore::new();
        let room = store.insert_room(&code("ABCDEF")).await.unwrap();
        let mut sub = store.subscribe(&room.id).await.unwrap();

        store
            .init_state(&room.id, &RoomState::initial())
            .await
            .unwrap();
        let v1 = store
            .write_state(&room.id, &RoomState::initial().advanced(), Some(0))
            .await
            .unwrap();

        assert_eq!(
            sub.next().await,
            Some(ChangeEvent::Inserted(RoomState::initial()))
        );
        assert_eq!(sub.next().await, Some(ChangeEvent::Updated(v1)));
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let store = MemoryStore::new();
        let room = live_room(&store, "ABCDEF").await;
        let sub = store.subscribe(&room.id).await.unwrap();
        assert_eq!(store.subscriber_count(&room.id), 1);

        drop(sub);
        store
            .write_state(&room.id, &RoomState::initial(), None)
            .await
            .unwrap();

        assert_eq!(store.subscriber_count(&room.id), 0);
    }

    #[tokio::test]
    async fn test_subscribe_unknown_room_registers_nothing() {
        let store = MemoryStore::new();

        let result = store.subscribe(&RoomId::new("ghost")).await;

        assert!(matches!(result, Err(StoreError::RoomNotFound(_))));
        assert_eq!(store.watcher_slots(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_subscriptions_do_not_accumulate() {
        let store = MemoryStore::new();
        let room = live_room(&store, "ABCDEF").await;

        for _ in 0..100 {
            let mut sub = store.subscribe(&room.id).await.unwrap();
            sub.cancel();
        }

        assert!(store.watcher_slots() <= 1);
        assert_eq!(store.subscriber_count(&room.id), 0);
    }

    #[tokio::test]
    async fn test_fail_next_read_fails_once() {
        let store = MemoryStore::new();
        let room = live_room(&store, "ABCDEF").await;
        store.fail_next_read("timeout");

        assert!(matches!(
            store.read_state(&room.id).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.read_state(&room.id).await.is_ok());
    }
}
