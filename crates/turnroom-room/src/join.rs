//! Join protocol: resolving codes and getting the local player onto a
//! room's roster.

use std::sync::Arc;

use tracing::{debug, info};
use turnroom_protocol::{PlayerId, Room, RoomCode, RoomId, RoomState};
use turnroom_store::{Backend, StoreError};

use crate::{RoomConfig, RoomError, Synchronizer};

/// Which remote procedure resolves a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinPath {
    /// First join: any room with this code.
    #[default]
    First,
    /// Late join: only a live room (one whose state document exists).
    Late,
}

/// Resolves codes and performs the roster append for one local player.
///
/// Cheap to clone: the backend is shared behind an `Arc`.
#[derive(Debug)]
pub struct JoinCoordinator<B> {
    backend: Arc<B>,
    player_id: PlayerId,
    config: RoomConfig,
}

impl<B> Clone for JoinCoordinator<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            player_id: self.player_id.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B: Backend> JoinCoordinator<B> {
    pub fn new(backend: Arc<B>, player_id: PlayerId, config: RoomConfig) -> Self {
        Self {
            backend,
            player_id,
            config: config.validated(),
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Makes sure the local player is on the roster of `room_id`.
    ///
    /// Idempotent: if `current` already lists the player nothing is
    /// written and `current` comes back unchanged. Otherwise the player is
    /// appended (and made host if `as_host` and no host exists) and the
    /// document is written against `current.version`. When another writer
    /// got there first, the winner's document is taken as the new base and
    /// the append re-applied, up to `cas_retry_limit` times, so concurrent
    /// joins never drop a member.
    ///
    /// Returns the document as stored.
    pub async fn ensure_player(
        &self,
        room_id: &RoomId,
        current: &RoomState,
        as_host: bool,
    ) -> Result<RoomState, RoomError> {
        let mut base = current.clone();
        let mut attempt = 0;

        loop {
            let Some(next) = base.with_player(&self.player_id, as_host) else {
                return Ok(base);
            };

            match self
                .backend
                .write_state(room_id, &next, Some(base.version))
                .await
            {
                Ok(stored) => {
                    info!(
                        %room_id,
                        player_id = %self.player_id,
                        host = stored.is_host(&self.player_id),
                        players = stored.player_count(),
                        "player joined room"
                    );
                    return Ok(stored);
                }
                Err(StoreError::Conflict { current, .. }) if attempt < self.config.cas_retry_limit => {
                    attempt += 1;
                    debug!(
                        %room_id,
                        attempt,
                        version = current.version,
                        "join lost a concurrent write, re-applying"
                    );
                    base = *current;
                }
                Err(e) => return Err(RoomError::StateWriteFailed(e)),
            }
        }
    }

    /// Resolves a user-typed code to a room id through the remote join
    /// procedures.
    ///
    /// The input is normalized first (trimmed, upper-cased).
    pub async fn resolve(&self, raw_code: &str, path: JoinPath) -> Result<RoomId, RoomError> {
        let code = RoomCode::normalize(raw_code);
        match path {
            JoinPath::First => match self.backend.join_room(&code).await {
                Ok(room_id) => Ok(room_id),
                Err(StoreError::CodeNotFound(_) | StoreError::RoomNotFound(_)) => {
                    Err(RoomError::RoomNotFound(code))
                }
                Err(e) => {
                    tracing::warn!(%code, error = %e, "join_room failed");
                    Err(RoomError::Store(e))
                }
            },
            JoinPath::Late => match self.backend.join_room_existing(&code).await {
                Ok(Some(room_id)) => Ok(room_id),
                Ok(None) => Err(RoomError::RoomNotFound(code)),
                Err(e) => {
                    tracing::warn!(%code, error = %e, "join_room_existing failed");
                    Err(RoomError::Store(e))
                }
            },
        }
    }

    /// Looks a room up by code without joining it.
    pub async fn lookup(&self, raw_code: &str) -> Result<Room, RoomError> {
        let code = RoomCode::normalize(raw_code);
        self.backend
            .find_room_by_code(&code)
            .await?
            .ok_or(RoomError::RoomNotFound(code))
    }

    /// Enters a room the local player created, as its host.
    pub async fn join_as_host(&self, room_id: RoomId) -> Result<Synchronizer<B>, RoomError> {
        let mut sync = Synchronizer::new(self.clone());
        sync.enter(room_id, true).await?;
        Ok(sync)
    }

    /// Joins a room by a user-typed code. Never sets the host.
    pub async fn join_by_code(
        &self,
        raw_code: &str,
        path: JoinPath,
    ) -> Result<Synchronizer<B>, RoomError> {
        let room_id = self.resolve(raw_code, path).await?;
        let mut sync = Synchronizer::new(self.clone());
        sync.enter(room_id, false).await?;
        Ok(sync)
    }
}
