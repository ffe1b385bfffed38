//! Per-room local profiles.
//!
//! A profile holds cosmetic stats a player tracks for themselves in one
//! room. It is loaded when entering the room, written on every change,
//! and never transmitted.

use serde::{Deserialize, Serialize};
use turnroom_protocol::{Codec, JsonCodec, PlayerId, RoomId};

use crate::{KeyValueStore, SessionError};

/// Prefix of every profile key: `turnroom.profile.<room_id>.<player_id>`.
pub const PROFILE_KEY_PREFIX: &str = "turnroom.profile";

/// Local-only stats of one player in one room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalProfile {
    pub hp: i64,
    pub gold: i64,
    pub threat: i64,
}

/// Loads and saves [`LocalProfile`]s keyed by (room, player).
#[derive(Debug)]
pub struct ProfileStore<K> {
    store: K,
    codec: JsonCodec,
}

impl<K: KeyValueStore> ProfileStore<K> {
    pub fn new(store: K) -> Self {
        Self {
            store,
            codec: JsonCodec,
        }
    }

    /// The composite key a profile lives under.
    pub fn key(room_id: &RoomId, player_id: &PlayerId) -> String {
        format!("{PROFILE_KEY_PREFIX}.{room_id}.{player_id}")
    }

    /// Loads a profile, or the zeroed default if none was saved.
    ///
    /// A record that no longer decodes is treated as absent.
    pub fn load(&self, room_id: &RoomId, player_id: &PlayerId) -> Result<LocalProfile, SessionError> {
        let key = Self::key(room_id, player_id);
        let Some(bytes) = self.store.get(&key)? else {
            return Ok(LocalProfile::default());
        };
        match self.codec.decode(&bytes) {
            Ok(profile) => Ok(profile),
            Err(e) => {
                tracing::warn!(%key, error = %e, "discarding unreadable profile");
                Ok(LocalProfile::default())
            }
        }
    }

    pub fn save(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        profile: &LocalProfile,
    ) -> Result<(), SessionError> {
        let bytes = self.codec.encode(profile)?;
        self.store.set(&Self::key(room_id, player_id), &bytes)
    }

    /// Loads, applies `change`, saves, and returns the new profile.
    pub fn update(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        change: impl FnOnce(&mut LocalProfile),
    ) -> Result<LocalProfile, SessionError> {
        let mut profile = self.load(room_id, player_id)?;
        change(&mut profile);
        self.save(room_id, player_id, &profile)?;
        Ok(profile)
    }

    /// Forgets a profile.
    pub fn clear(&self, room_id: &RoomId, player_id: &PlayerId) -> Result<(), SessionError> {
        self.store.remove(&Self::key(room_id, player_id))
    }
}
