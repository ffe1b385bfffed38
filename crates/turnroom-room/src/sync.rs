//! Shared state synchronization.
//!
//! A [`Synchronizer`] mirrors one room's state document locally. It reads
//! the document once on entry, then keeps the mirror current from the
//! change feed; local mutations go out through [`Synchronizer::publish`]
//! as versioned conditional writes.

use tracing::{debug, info, warn};
use turnroom_protocol::{ChangeEvent, PlayerId, RoomId, RoomState};
use turnroom_store::{Backend, StoreError, Subscription};

use crate::{JoinCoordinator, RoomError, SyncState, Teardown};

/// What applying one feed event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The mirror now holds this document.
    Applied(RoomState),
    /// The event was older than the mirror, or arrived while not synced.
    Ignored,
    /// The room is gone. The synchronizer is now disconnected.
    RoomDeleted,
    /// The feed ended without a deletion. The synchronizer is now
    /// disconnected.
    FeedClosed,
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The write committed; the mirror holds the stored document.
    Committed(RoomState),
    /// Another writer committed first; the mirror holds theirs.
    Rejected { current: RoomState },
}

/// Mirrors the state of one room for the local player.
///
/// Single owner: all mutation goes through `&mut self`, so the mirror
/// needs no lock.
#[derive(Debug)]
pub struct Synchronizer<B> {
    joiner: JoinCoordinator<B>,
    room_id: Option<RoomId>,
    state: SyncState,
    mirror: Option<RoomState>,
    subscription: Option<Subscription>,
}

impl<B: Backend> Synchronizer<B> {
    /// Creates a disconnected synchronizer for the coordinator's player.
    pub fn new(joiner: JoinCoordinator<B>) -> Self {
        Self {
            joiner,
            room_id: None,
            state: SyncState::Disconnected,
            mirror: None,
            subscription: None,
        }
    }

    fn transition(&mut self, target: SyncState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "invalid sync transition {} -> {target}",
            self.state
        );
        self.state = target;
    }

    /// Enters a room: subscribes to its changes, fetches the document once,
    /// and makes sure the local player is on the roster.
    ///
    /// The subscription is opened before the fetch so no commit between
    /// the two is missed; anything the fetch already covers is discarded
    /// later by version.
    ///
    /// # Errors
    /// - [`RoomError::StateReadFailed`] if the fetch fails
    /// - [`RoomError::StateWriteFailed`] if the roster append fails
    /// - [`RoomError::Store`] if the feed cannot be opened
    ///
    /// On any error the synchronizer ends up [`SyncState::Disconnected`].
    pub async fn enter(&mut self, room_id: RoomId, as_host: bool) -> Result<RoomState, RoomError> {
        if self.state != SyncState::Disconnected {
            self.disconnect();
        }
        self.transition(SyncState::Loading);
        self.room_id = Some(room_id.clone());
        debug!(%room_id, as_host, "entering room");

        match self.load(&room_id, as_host).await {
            Ok((subscription, stored)) => {
                self.subscription = Some(subscription);
                self.mirror = Some(stored.clone());
                self.transition(SyncState::Synced);
                info!(
                    %room_id,
                    player_id = %self.joiner.player_id(),
                    turn = stored.turn,
                    version = stored.version,
                    "room synced"
                );
                Ok(stored)
            }
            Err(e) => {
                warn!(%room_id, error = %e, "entering room failed");
                self.disconnect();
                Err(e)
            }
        }
    }

    async fn load(
        &self,
        room_id: &RoomId,
        as_host: bool,
    ) -> Result<(Subscription, RoomState), RoomError> {
        let backend = self.joiner.backend();
        let subscription = backend.subscribe(room_id).await?;
        let fetched = backend
            .read_state(room_id)
            .await
            .map_err(RoomError::StateReadFailed)?;
        let stored = self.joiner.ensure_player(room_id, &fetched, as_host).await?;
        Ok((subscription, stored))
    }

    /// Applies one change event to the mirror.
    ///
    /// Inserts and updates replace the mirror wholesale unless they are
    /// older than it (`turn` never goes backwards). A deletion disconnects.
    pub fn apply(&mut self, event: ChangeEvent) -> SyncOutcome {
        if self.state != SyncState::Synced {
            return SyncOutcome::Ignored;
        }
        let kind = event.kind();
        match event.into_state() {
            Some(incoming) => {
                let local_version = self.mirror.as_ref().map_or(0, |m| m.version);
                if incoming.version < local_version {
                    debug!(
                        room_id = ?self.room_id,
                        %kind,
                        incoming = incoming.version,
                        local = local_version,
                        "discarding stale change"
                    );
                    return SyncOutcome::Ignored;
                }
                debug!(
                    room_id = ?self.room_id,
                    %kind,
                    version = incoming.version,
                    turn = incoming.turn,
                    players = incoming.player_count(),
                    "change applied"
                );
                self.mirror = Some(incoming.clone());
                self.transition(SyncState::Synced);
                SyncOutcome::Applied(incoming)
            }
            None => {
                info!(room_id = ?self.room_id, "room deleted");
                self.disconnect();
                SyncOutcome::RoomDeleted
            }
        }
    }

    /// Waits for the next feed event and applies it.
    ///
    /// Cancel-safe: usable as a `tokio::select!` branch. Returns
    /// [`SyncOutcome::FeedClosed`] immediately when not subscribed.
    pub async fn next_event(&mut self) -> SyncOutcome {
        let Some(subscription) = self.subscription.as_mut() else {
            return SyncOutcome::FeedClosed;
        };
        match subscription.next().await {
            Some(event) => self.apply(event),
            None => {
                warn!(room_id = ?self.room_id, "change feed closed");
                self.disconnect();
                SyncOutcome::FeedClosed
            }
        }
    }

    /// Publishes a new document derived from the mirror.
    ///
    /// `next.version` must be the version `next` was derived from. The
    /// mirror adopts `next` immediately, then the write is sent against
    /// that version. On success the mirror holds the stored document; on
    /// a conflict it holds the winner's and the write is reported as
    /// rejected. Other write failures leave the optimistic copy in place
    /// until the feed corrects it.
    pub async fn publish(&mut self, next: RoomState) -> Result<PublishOutcome, RoomError> {
        if self.state != SyncState::Synced {
            return Err(RoomError::NotSynced);
        }
        let Some(room_id) = self.room_id.clone() else {
            return Err(RoomError::NotSynced);
        };
        let base_version = next.version;
        self.mirror = Some(next.clone());

        match self
            .joiner
            .backend()
            .write_state(&room_id, &next, Some(base_version))
            .await
        {
            Ok(stored) => {
                self.adopt(stored.clone());
                Ok(PublishOutcome::Committed(stored))
            }
            Err(StoreError::Conflict { current, .. }) => {
                let current = *current;
                debug!(
                    %room_id,
                    base = base_version,
                    current = current.version,
                    "publish rejected by a newer write"
                );
                self.adopt(current.clone());
                Ok(PublishOutcome::Rejected { current })
            }
            Err(e) => Err(RoomError::StateWriteFailed(e)),
        }
    }

    fn adopt(&mut self, state: RoomState) {
        let newer = self
            .mirror
            .as_ref()
            .is_none_or(|m| state.version >= m.version);
        if newer && self.state == SyncState::Synced {
            self.mirror = Some(state);
        }
    }

    /// Cancels the subscription and drops to [`SyncState::Disconnected`].
    /// The room id is kept so a teardown can still address the room.
    pub fn disconnect(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.mirror = None;
        self.transition(SyncState::Disconnected);
    }

    /// A handle for leaving the current room, if one was entered.
    pub fn teardown(&self) -> Option<Teardown<B>> {
        let room_id = self.room_id.clone()?;
        Some(Teardown::new(
            std::sync::Arc::clone(self.joiner.backend()),
            room_id,
            self.joiner.player_id().clone(),
        ))
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_synced(&self) -> bool {
        self.state == SyncState::Synced
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn player_id(&self) -> &PlayerId {
        self.joiner.player_id()
    }

    /// The mirrored document, while synced.
    pub fn snapshot(&self) -> Option<&RoomState> {
        self.mirror.as_ref()
    }

    /// Returns `true` if the local player is the room's host.
    pub fn is_host(&self) -> bool {
        self.mirror
            .as_ref()
            .is_some_and(|m| m.is_host(self.joiner.player_id()))
    }

    pub fn joiner(&self) -> &JoinCoordinator<B> {
        &self.joiner
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use turnroom_protocol::{PlayerEntry, RoomCode};
    use turnroom_store::{MemoryStore, RoomStore};

    use super::*;
    use crate::RoomConfig;

    async fn live_room(store: &MemoryStore) -> RoomId {
        let room = store.insert_room(&RoomCode::normalize("SYNC22")).await.unwrap();
        store
            .init_state(&room.id, &RoomState::initial())
            .await
            .unwrap();
        room.id
    }

    fn synchronizer(store: &MemoryStore, player: &str) -> Synchronizer<MemoryStore> {
        Synchronizer::new(JoinCoordinator::new(
            Arc::new(store.clone()),
            PlayerId::new(player),
            RoomConfig::default(),
        ))
    }

    fn state(version: u64, turn: u64, players: &[&str]) -> RoomState {
        RoomState {
            version,
            turn,
            players: players
                .iter()
                .map(|id| PlayerEntry { id: PlayerId::new(*id) })
                .collect(),
            host_id: players.first().map(|id| PlayerId::new(*id)),
        }
    }

    #[tokio::test]
    async fn test_enter_reaches_synced_with_player_on_roster() {
        let store = MemoryStore::new();
        let room_id = live_room(&store).await;
        let mut sync = synchronizer(&store, "host");
        assert_eq!(sync.state(), SyncState::Disconnected);

        let stored = sync.enter(room_id, true).await.unwrap();

        assert_eq!(sync.state(), SyncState::Synced);
        assert!(stored.contains(&PlayerId::new("host")));
        assert!(sync.is_host());
    }

    #[tokio::test]
    async fn test_enter_fetch_failure_disconnects() {
        let store = MemoryStore::new();
        let room_id = live_room(&store).await;
        store.fail_next_read("timeout");
        let mut sync = synchronizer(&store, "host");

        let result = sync.enter(room_id, true).await;

        assert!(matches!(result, Err(RoomError::StateReadFailed(_))));
        assert_eq!(sync.state(), SyncState::Disconnected);
        assert!(sync.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_apply_replaces_mirror_wholesale() {
        let store = MemoryStore::new();
        let room_id = live_room(&store).await;
        let mut sync = synchronizer(&store, "a");
        sync.enter(room_id, true).await.unwrap();

        let incoming = state(5, 4, &["a", "b"]);
        let outcome = sync.apply(ChangeEvent::Updated(incoming.clone()));

        assert_eq!(outcome, SyncOutcome::Applied(incoming.clone()));
        assert_eq!(sync.snapshot(), Some(&incoming));
    }

    #[tokio::test]
    async fn test_apply_stale_event_is_ignored() {
        let store = MemoryStore::new();
        let room_id = live_room(&store).await;
        let mut sync = synchronizer(&store, "a");
        sync.enter(room_id, true).await.unwrap();
        sync.apply(ChangeEvent::Updated(state(7, 5, &["a", "b"])));

        let outcome = sync.apply(ChangeEvent::Updated(state(6, 4, &["a", "b"])));

        assert_eq!(outcome, SyncOutcome::Ignored);
        assert_eq!(sync.snapshot().unwrap().turn, 5);
    }

    #[tokio::test]
    async fn test_apply_deleted_disconnects() {
        let store = MemoryStore::new();
        let room_id = live_room(&store).await;
        let mut sync = synchronizer(&store, "a");
        sync.enter(room_id.clone(), true).await.unwrap();

        let outcome = sync.apply(ChangeEvent::Deleted);

        assert_eq!(outcome, SyncOutcome::RoomDeleted);
        assert_eq!(sync.state(), SyncState::Disconnected);
        assert_eq!(sync.room_id(), Some(&room_id));
        assert_eq!(store.subscriber_count(&room_id), 0);
    }

    #[tokio::test]
    async fn test_apply_while_disconnected_is_ignored() {
        let store = MemoryStore::new();
        let mut sync = synchronizer(&store, "a");

        let outcome = sync.apply(ChangeEvent::Updated(state(1, 1, &["a"])));

        assert_eq!(outcome, SyncOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_next_event_sees_other_clients_writes() {
        let store = MemoryStore::new();
        let room_id = live_room(&store).await;
        let mut host = synchronizer(&store, "host");
        host.enter(room_id.clone(), true).await.unwrap();
        // Drain the host's own join.
        host.next_event().await;

        let mut guest = synchronizer(&store, "guest");
        guest.enter(room_id, false).await.unwrap();

        match host.next_event().await {
            SyncOutcome::Applied(state) => {
                assert_eq!(state.player_count(), 2);
                assert!(state.contains(&PlayerId::new("guest")));
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_commits_and_adopts_stored() {
        let store = MemoryStore::new();
        let room_id = live_room(&store).await;
        let mut sync = synchronizer(&store, "a");
        let joined = sync.enter(room_id, true).await.unwrap();

        let outcome = sync.publish(joined.advanced()).await.unwrap();

        match outcome {
            PublishOutcome::Committed(stored) => {
                assert_eq!(stored.turn, 2);
                assert_eq!(stored.version, joined.version + 1);
                assert_eq!(sync.snapshot(), Some(&stored));
            }
            other => panic!("expected Committed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_conflict_adopts_winner() {
        let store = MemoryStore::new();
        let room_id = live_room(&store).await;
        let mut sync = synchronizer(&store, "a");
        let joined = sync.enter(room_id.clone(), true).await.unwrap();
        let winner = store
            .write_state(&room_id, &joined.advanced().advanced(), None)
            .await
            .unwrap();

        let outcome = sync.publish(joined.advanced()).await.unwrap();

        assert_eq!(outcome, PublishOutcome::Rejected { current: winner.clone() });
        assert_eq!(sync.snapshot(), Some(&winner));
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_optimistic_copy() {
        let store = MemoryStore::new();
        let room_id = live_room(&store).await;
        let mut sync = synchronizer(&store, "a");
        let joined = sync.enter(room_id, true).await.unwrap();
        store.fail_next_write("network down");

        let result = sync.publish(joined.advanced()).await;

        assert!(matches!(result, Err(RoomError::StateWriteFailed(_))));
        assert_eq!(sync.snapshot().unwrap().turn, 2);
    }

    #[tokio::test]
    async fn test_publish_while_disconnected_returns_not_synced() {
        let store = MemoryStore::new();
        let mut sync = synchronizer(&store, "a");

        let result = sync.publish(RoomState::initial()).await;

        assert!(matches!(result, Err(RoomError::NotSynced)));
    }

    #[tokio::test]
    async fn test_disconnect_cancels_subscription() {
        let store = MemoryStore::new();
        let room_id = live_room(&store).await;
        let mut sync = synchronizer(&store, "a");
        sync.enter(room_id.clone(), true).await.unwrap();

        sync.disconnect();

        assert_eq!(sync.state(), SyncState::Disconnected);
        assert_eq!(sync.next_event().await, SyncOutcome::FeedClosed);
    }
}
