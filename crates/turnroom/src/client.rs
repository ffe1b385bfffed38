//! `TurnroomClient` builder and room entry points.
//!
//! The client is what an application holds for the lifetime of the device
//! session. It resolves the player's identity once, then opens rooms:
//! create → host, code → join, saved entry → resume.

use std::sync::Arc;

use tracing::{info, warn};
use turnroom_hold::HoldConfig;
use turnroom_protocol::{PlayerId, Room, RoomCode};
use turnroom_room::{JoinCoordinator, JoinPath, RoomConfig, RoomError, RoomRegistry, Synchronizer};
use turnroom_session::{IdentityProvider, KeyValueStore, ProfileStore, SessionEntry};
use turnroom_store::Backend;

use crate::{RoomSession, TurnroomError};

/// Everything tunable about a client.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Code length, creation attempts, readiness, join retries.
    pub room: RoomConfig,
    /// How long the host must hold to advance the turn.
    pub hold: HoldConfig,
    /// Which join procedure [`TurnroomClient::join`] uses.
    pub join_path: JoinPath,
}

impl ClientConfig {
    /// Clamps every section into its supported range.
    pub fn validated(self) -> Self {
        Self {
            room: self.room.validated(),
            hold: self.hold.validated(),
            join_path: self.join_path,
        }
    }
}

/// Builder for a [`TurnroomClient`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use turnroom::prelude::*;
///
/// # fn run() -> Result<(), TurnroomError> {
/// let client = TurnroomClient::builder()
///     .hold_config(HoldConfig::with_duration(Duration::from_millis(600)))
///     .join_path(JoinPath::Late)
///     .build(MemoryStore::new(), MemoryKeyValueStore::new())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TurnroomClientBuilder {
    config: ClientConfig,
}

impl TurnroomClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    pub fn hold_config(mut self, config: HoldConfig) -> Self {
        self.config.hold = config;
        self
    }

    pub fn join_path(mut self, path: JoinPath) -> Self {
        self.config.join_path = path;
        self
    }

    /// Builds the client on `backend`, with identity and profiles kept in
    /// `storage`.
    ///
    /// # Errors
    /// [`TurnroomError::Session`] if the device identity cannot be read or
    /// persisted.
    pub fn build<B, K>(self, backend: B, storage: K) -> Result<TurnroomClient<B, K>, TurnroomError>
    where
        B: Backend,
        K: KeyValueStore + Clone,
    {
        let config = self.config.validated();
        let player_id = IdentityProvider::new(storage.clone()).player_id()?;
        let backend = Arc::new(backend);

        info!(%player_id, "turnroom client ready");
        Ok(TurnroomClient {
            registry: RoomRegistry::new(Arc::clone(&backend), config.room.clone()),
            joiner: JoinCoordinator::new(backend, player_id, config.room.clone()),
            profiles: Arc::new(ProfileStore::new(storage)),
            config,
        })
    }
}

/// Opens rooms for one device identity.
#[derive(Debug)]
pub struct TurnroomClient<B, K> {
    registry: RoomRegistry<B>,
    joiner: JoinCoordinator<B>,
    profiles: Arc<ProfileStore<K>>,
    config: ClientConfig,
}

impl TurnroomClient<(), ()> {
    /// Creates a new builder. The backend and storage types are fixed by
    /// [`TurnroomClientBuilder::build`].
    pub fn builder() -> TurnroomClientBuilder {
        TurnroomClientBuilder::new()
    }
}

impl<B: Backend, K: KeyValueStore> TurnroomClient<B, K> {
    pub fn player_id(&self) -> &PlayerId {
        self.joiner.player_id()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The backend every session of this client talks to.
    pub fn backend(&self) -> &Arc<B> {
        self.joiner.backend()
    }

    /// Creates a room and enters it as host.
    ///
    /// If the room was created but could not be entered, it is deleted
    /// again on a best-effort basis before the error is returned.
    pub async fn create_room(&self) -> Result<RoomSession<B, K>, TurnroomError> {
        let room = self.registry.create_room().await?;
        let sync = match self.joiner.join_as_host(room.id.clone()).await {
            Ok(sync) => sync,
            Err(e) => {
                warn!(room_id = %room.id, code = %room.code, error = %e, "created room but could not enter it, deleting");
                if let Err(cleanup) = self.backend().delete_room(&room.id).await {
                    warn!(room_id = %room.id, error = %cleanup, "unentered room cleanup failed");
                }
                return Err(e.into());
            }
        };
        self.open(sync, room.code)
    }

    /// Parses a saved entry query for this client's code length.
    pub fn parse_entry(&self, query: &str) -> Result<SessionEntry, TurnroomError> {
        Ok(SessionEntry::from_query(query, self.config.room.code_length)?)
    }

    /// Joins a room by a user-typed code, using the configured join path.
    pub async fn join(&self, raw_code: &str) -> Result<RoomSession<B, K>, TurnroomError> {
        self.join_with(raw_code, self.config.join_path).await
    }

    /// Joins a room by a user-typed code over `path`.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`] if no room has the code.
    pub async fn join_with(
        &self,
        raw_code: &str,
        path: JoinPath,
    ) -> Result<RoomSession<B, K>, TurnroomError> {
        let sync = self.joiner.join_by_code(raw_code, path).await?;
        self.open(sync, RoomCode::normalize(raw_code))
    }

    /// Re-enters the room an entry describes, for a reload or a second tab.
    ///
    /// The entry's host flag only matters if the room has no host yet.
    pub async fn resume(&self, entry: &SessionEntry) -> Result<RoomSession<B, K>, TurnroomError> {
        let mut sync = Synchronizer::new(self.joiner.clone());
        sync.enter(entry.room_id.clone(), entry.is_host).await?;
        self.open(sync, entry.code.clone())
    }

    /// Looks a code up without joining.
    pub async fn lookup(&self, raw_code: &str) -> Result<Room, TurnroomError> {
        Ok(self.joiner.lookup(raw_code).await?)
    }

    fn open(&self, sync: Synchronizer<B>, code: RoomCode) -> Result<RoomSession<B, K>, TurnroomError> {
        let (Some(room_id), Some(teardown)) = (sync.room_id().cloned(), sync.teardown()) else {
            return Err(RoomError::NotSynced.into());
        };
        let entry = SessionEntry::new(room_id, code, sync.is_host());
        RoomSession::open(
            sync,
            teardown,
            entry,
            self.config.hold.clone(),
            self.config.room.min_ready_players,
            Arc::clone(&self.profiles),
        )
    }
}
