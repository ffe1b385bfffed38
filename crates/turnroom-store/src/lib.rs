//! Backend abstraction layer for Turnroom.
//!
//! Turnroom does not own the canonical room record. It talks to three
//! external collaborators, each behind its own trait:
//!
//! - [`RoomStore`]: the persistence/query layer (room records and the
//!   per-room state document)
//! - [`RemoteProcedures`]: opaque server-side calls (join by code, leave)
//! - [`ChangeFeed`]: the realtime push channel of row-level changes
//!
//! A backend that provides all three is a [`Backend`]. Mixing sources is
//! done with [`WithFeed`], e.g. an in-process store whose changes arrive
//! over a WebSocket relay.
//!
//! # Feature Flags
//!
//! - `memory` (default): [`MemoryStore`], an in-process backend used by
//!   tests, demos, and the relay
//! - `websocket` (default): [`FeedRelay`] and [`WebSocketFeed`], a change
//!   feed carried over `tokio-tungstenite`

mod error;
#[cfg(feature = "memory")]
mod memory;
mod subscription;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::StoreError;
#[cfg(feature = "memory")]
pub use memory::MemoryStore;
pub use subscription::{Subscription, SubscriptionSender};
#[cfg(feature = "websocket")]
pub use websocket::{FeedRelay, WebSocketFeed};

use std::future::Future;

use turnroom_protocol::{PlayerId, Room, RoomCode, RoomId, RoomState};

/// The persistence/query layer holding rooms and their state documents.
///
/// All writes of the state document replace it whole; there is no patch
/// form. Every committed write bumps `RoomState::version` by one.
pub trait RoomStore: Send + Sync + 'static {
    /// Atomically inserts a room record with the given code.
    ///
    /// # Errors
    /// [`StoreError::CodeTaken`] if another room already uses `code`.
    fn insert_room(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send;

    /// Creates the state document for a freshly inserted room.
    fn init_state(
        &self,
        room_id: &RoomId,
        state: &RoomState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Looks a room up by exact code. Callers normalize the code first.
    fn find_room_by_code(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<Option<Room>, StoreError>> + Send;

    /// Reads the current state document of a room.
    fn read_state(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<RoomState, StoreError>> + Send;

    /// Replaces the state document and returns what was stored.
    ///
    /// With `expected_version = Some(v)` the write only commits if the
    /// stored document is still at version `v`; otherwise it fails with
    /// [`StoreError::Conflict`] carrying the current document. `None`
    /// writes unconditionally (last writer wins).
    fn write_state(
        &self,
        room_id: &RoomId,
        state: &RoomState,
        expected_version: Option<u64>,
    ) -> impl Future<Output = Result<RoomState, StoreError>> + Send;

    /// Deletes a room record together with its state document.
    fn delete_room(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Server-side procedures invoked by name, opaque to the client.
pub trait RemoteProcedures: Send + Sync + 'static {
    /// First join by code. Fails with [`StoreError::CodeNotFound`] if no
    /// room has this code.
    fn join_room(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<RoomId, StoreError>> + Send;

    /// Late join by code: resolves only rooms that are live (record and
    /// state document both present). `None` when nothing matches.
    fn join_room_existing(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<Option<RoomId>, StoreError>> + Send;

    /// Removes a player from a room. The backend deletes the room once
    /// its roster is empty.
    fn leave_room(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// The realtime change-notification channel.
pub trait ChangeFeed: Send + Sync + 'static {
    /// Starts delivering changes for one room. Events arrive in the order
    /// the store committed them. Dropping the returned handle (or calling
    /// [`Subscription::cancel`]) stops delivery.
    fn subscribe(
        &self,
        room_id: &RoomId,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send;
}

/// Everything the room layer needs from the outside world.
pub trait Backend: RoomStore + RemoteProcedures + ChangeFeed {}

impl<T: RoomStore + RemoteProcedures + ChangeFeed> Backend for T {}

// ---------------------------------------------------------------------------
// WithFeed
// ---------------------------------------------------------------------------

/// A [`Backend`] that takes records and procedures from `S` and change
/// events from `F`.
#[derive(Debug, Clone)]
pub struct WithFeed<S, F> {
    store: S,
    feed: F,
}

impl<S, F> WithFeed<S, F> {
    pub fn new(store: S, feed: F) -> Self {
        Self { store, feed }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }
}

impl<S: RoomStore, F: Send + Sync + 'static> RoomStore for WithFeed<S, F> {
    async fn insert_room(&self, code: &RoomCode) -> Result<Room, StoreError> {
        self.store.insert_room(code).await
    }

    async fn init_state(&self, room_id: &RoomId, state: &RoomState) -> Result<(), StoreError> {
        self.store.init_state(room_id, state).await
    }

    async fn find_room_by_code(&self, code: &RoomCode) -> Result<Option<Room>, StoreError> {
        self.store.find_room_by_code(code).await
    }

    async fn read_state(&self, room_id: &RoomId) -> Result<RoomState, StoreError> {
        self.store.read_state(room_id).await
    }

    async fn write_state(
        &self,
        room_id: &RoomId,
        state: &RoomState,
        expected_version: Option<u64>,
    ) -> Result<RoomState, StoreError> {
        self.store.write_state(room_id, state, expected_version).await
    }

    async fn delete_room(&self, room_id: &RoomId) -> Result<(), StoreError> {
        self.store.delete_room(room_id).await
    }
}

impl<S: RemoteProcedures, F: Send + Sync + 'static> RemoteProcedures for WithFeed<S, F> {
    async fn join_room(&self, code: &RoomCode) -> Result<RoomId, StoreError> {
        self.store.join_room(code).await
    }

    async fn join_room_existing(&self, code: &RoomCode) -> Result<Option<RoomId>, StoreError> {
        self.store.join_room_existing(code).await
    }

    async fn leave_room(&self, room_id: &RoomId, player_id: &PlayerId) -> Result<(), StoreError> {
        self.store.leave_room(room_id, player_id).await
    }
}

impl<S: Send + Sync + 'static, F: ChangeFeed> ChangeFeed for WithFeed<S, F> {
    async fn subscribe(&self, room_id: &RoomId) -> Result<Subscription, StoreError> {
        self.feed.subscribe(room_id).await
    }
}
