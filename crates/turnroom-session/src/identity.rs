//! Stable device identity.
//!
//! A player is identified by the device profile, not by an account. The
//! identifier is generated the first time it is needed and then reused for
//! every room the device joins: it is the join key, the leave key, and the
//! host key.

use std::sync::OnceLock;

use turnroom_protocol::PlayerId;

use crate::{KeyValueStore, SessionError};

/// Key under which the device's player id is persisted.
pub const PLAYER_ID_KEY: &str = "turnroom.player_id";

/// Resolves the local [`PlayerId`], generating and persisting it once.
#[derive(Debug)]
pub struct IdentityProvider<K> {
    store: K,
    cached: OnceLock<PlayerId>,
}

impl<K: KeyValueStore> IdentityProvider<K> {
    pub fn new(store: K) -> Self {
        Self {
            store,
            cached: OnceLock::new(),
        }
    }

    /// Returns the device's player id.
    ///
    /// Reads [`PLAYER_ID_KEY`]; if unset (or unreadable as UTF-8) a fresh
    /// UUID v4 is generated and written back. Later calls return the same
    /// id without touching storage.
    ///
    /// # Errors
    /// Returns [`SessionError::Storage`] if the store cannot be read, or if
    /// a freshly generated id cannot be persisted. An id that cannot be
    /// persisted would change on the next launch, so it is not handed out.
    pub fn player_id(&self) -> Result<PlayerId, SessionError> {
        if let Some(id) = self.cached.get() {
            return Ok(id.clone());
        }

        let stored = self
            .store
            .get(PLAYER_ID_KEY)?
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());

        let id = match stored {
            Some(raw) => PlayerId::new(raw),
            None => {
                let id = PlayerId::generate();
                self.store.set(PLAYER_ID_KEY, id.as_str().as_bytes())?;
                tracing::info!(player_id = %id, "generated new device identity");
                id
            }
        };

        Ok(self.cached.get_or_init(|| id).clone())
    }

    pub fn store(&self) -> &K {
        &self.store
    }
}
