//! Core documents and events shared by every Turnroom layer.
//!
//! The JSON shapes here are what the backing store persists and what the
//! change feed delivers, so field names follow the store's camelCase
//! convention (`hostId`, not `host_id`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::RoomCode;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of a room record, assigned by the store.
///
/// Serialized as a plain string (`#[serde(transparent)]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a player's device profile.
///
/// Generated once per device and reused across every room that device
/// joins. It is the join, leave, and host key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// The canonical room record: an id and the code players share.
///
/// Immutable once created. The store destroys it when the last player
/// leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub code: RoomCode,
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// One roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub id: PlayerId,
}

/// The single shared, mutable document of a room.
///
/// Every client mirrors this document and replaces its copy wholesale
/// whenever the feed delivers a newer one. `version` is assigned by the
/// store and increases by one on every committed write; mutators send the
/// version they derived their change from so the store can reject a
/// write based on a stale copy.
///
/// Invariants maintained by the constructors below:
/// - `turn >= 1`
/// - `players` holds no duplicate ids
/// - `host_id` is only set by the first host join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    #[serde(default)]
    pub version: u64,
    pub turn: u64,
    #[serde(default)]
    pub players: Vec<PlayerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<PlayerId>,
}

impl RoomState {
    /// The document every room starts with: turn 1, nobody seated.
    pub fn initial() -> Self {
        Self {
            version: 0,
            turn: 1,
            players: Vec::new(),
            host_id: None,
        }
    }

    /// Returns `true` if `player` is on the roster.
    pub fn contains(&self, player: &PlayerId) -> bool {
        self.players.iter().any(|p| &p.id == player)
    }

    /// Returns `true` if `player` is the room's host.
    pub fn is_host(&self, player: &PlayerId) -> bool {
        self.host_id.as_ref() == Some(player)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` once at least `min_players` are seated. Turn
    /// controls stay suspended until then.
    pub fn is_ready(&self, min_players: usize) -> bool {
        self.players.len() >= min_players
    }

    /// Returns a copy with `player` appended, or `None` if already seated.
    ///
    /// When `as_host` is set and no host exists yet, `player` also becomes
    /// the host. An existing host is never replaced. `turn` and `version`
    /// carry over unchanged.
    pub fn with_player(&self, player: &PlayerId, as_host: bool) -> Option<Self> {
        if self.contains(player) {
            return None;
        }
        let mut next = self.clone();
        next.players.push(PlayerEntry { id: player.clone() });
        if as_host && next.host_id.is_none() {
            next.host_id = Some(player.clone());
        }
        Some(next)
    }

    /// Returns a copy with the turn counter advanced by exactly one.
    ///
    /// `players`, `host_id`, and `version` carry over unchanged; the store
    /// bumps `version` when the write commits.
    pub fn advanced(&self) -> Self {
        Self {
            turn: self.turn.saturating_add(1),
            ..self.clone()
        }
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::initial()
    }
}

// ---------------------------------------------------------------------------
// Change events
// ---------------------------------------------------------------------------

/// A row-level change delivered by the realtime feed.
///
/// Inserts and updates carry the full new document; there is no patch
/// form. A deletion means the room record is gone.
///
/// Adjacently tagged:
///   `{ "type": "Updated", "state": { "version": 3, "turn": 2, ... } }`
///   `{ "type": "Deleted" }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "state")]
pub enum ChangeEvent {
    Inserted(RoomState),
    Updated(RoomState),
    Deleted,
}

/// The kind of a [`ChangeEvent`], without its payload. Handy for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

impl ChangeEvent {
    /// The full document carried by the event, if any.
    pub fn state(&self) -> Option<&RoomState> {
        match self {
            Self::Inserted(state) | Self::Updated(state) => Some(state),
            Self::Deleted => None,
        }
    }

    pub fn into_state(self) -> Option<RoomState> {
        match self {
            Self::Inserted(state) | Self::Updated(state) => Some(state),
            Self::Deleted => None,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Inserted(_) => ChangeKind::Inserted,
            Self::Updated(_) => ChangeKind::Updated,
            Self::Deleted => ChangeKind::Deleted,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inserted => write!(f, "inserted"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

// ---------------------------------------------------------------------------
// FeedFrame: change feed wire format
// ---------------------------------------------------------------------------

/// A message on the WebSocket change feed.
///
/// Internally tagged: `{ "type": "Subscribe", "room_id": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeedFrame {
    /// Client → relay: start delivering changes for this room.
    Subscribe { room_id: RoomId },

    /// Client → relay: stop delivering changes for this room.
    Unsubscribe { room_id: RoomId },

    /// Relay → client: the subscription is live. Every commit after this
    /// frame will be delivered.
    Subscribed { room_id: RoomId },

    /// Relay → client: one change, in commit order for its room.
    Event { room_id: RoomId, event: ChangeEvent },

    /// Relay → client: the subscription could not be served.
    Error { message: String },
}

// =========================================================================
// Tests
// =========================================================================
