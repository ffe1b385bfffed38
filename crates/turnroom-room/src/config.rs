//! Room configuration and the synchronizer state machine.

use serde::{Deserialize, Serialize};
use tracing::warn;
use turnroom_protocol::DEFAULT_CODE_LENGTH;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by the room-layer components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Symbols per generated room code.
    pub code_length: usize,

    /// How many codes the registry tries before giving up on creation.
    pub max_create_attempts: u32,

    /// Players required before turn controls unlock.
    pub min_ready_players: usize,

    /// How often a join re-applies itself after losing a concurrent write.
    pub cas_retry_limit: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            code_length: DEFAULT_CODE_LENGTH,
            max_create_attempts: 5,
            min_ready_players: 2,
            cas_retry_limit: 3,
        }
    }
}

impl RoomConfig {
    pub const MIN_CODE_LENGTH: usize = 4;
    pub const MAX_CODE_LENGTH: usize = 12;
    pub const MAX_CAS_RETRIES: u32 = 16;

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `code_length` clamped to `4..=12`
    /// - `max_create_attempts` and `min_ready_players` at least 1
    /// - `cas_retry_limit` capped at [`Self::MAX_CAS_RETRIES`]
    pub fn validated(mut self) -> Self {
        let code_length = self
            .code_length
            .clamp(Self::MIN_CODE_LENGTH, Self::MAX_CODE_LENGTH);
        if code_length != self.code_length {
            warn!(
                requested = self.code_length,
                clamped = code_length,
                "code_length out of range, clamping"
            );
            self.code_length = code_length;
        }
        self.max_create_attempts = self.max_create_attempts.max(1);
        self.min_ready_players = self.min_ready_players.max(1);
        if self.cas_retry_limit > Self::MAX_CAS_RETRIES {
            warn!(
                requested = self.cas_retry_limit,
                max = Self::MAX_CAS_RETRIES,
                "cas_retry_limit exceeds maximum, clamping"
            );
            self.cas_retry_limit = Self::MAX_CAS_RETRIES;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// SyncState
// ---------------------------------------------------------------------------

/// Connection state of a [`Synchronizer`](crate::Synchronizer).
///
/// ```text
///                 enter           fetch + join ok
/// Disconnected ─────────▶ Loading ───────────────▶ Synced ─┐ change event
///      ▲                     │                       │  ◀──┘
///      └─────────────────────┴───────────────────────┘
///        fetch failure / deletion / leave
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    Disconnected,
    Loading,
    Synced,
}

impl SyncState {
    /// Returns `true` if the state machine permits `self → target`.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Disconnected, Self::Loading)
                | (Self::Loading, Self::Synced)
                | (Self::Synced, Self::Synced)
                | (_, Self::Disconnected)
        )
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Loading => write!(f, "Loading"),
            Self::Synced => write!(f, "Synced"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.code_length, 6);
        assert_eq!(config.max_create_attempts, 5);
        assert_eq!(config.min_ready_players, 2);
        assert_eq!(config.cas_retry_limit, 3);
    }

    #[test]
    fn test_validated_clamps_code_length() {
        let config = RoomConfig {
            code_length: 1,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.code_length, RoomConfig::MIN_CODE_LENGTH);
    }

    #[test]
    fn test_validated_zero_attempts_becomes_one() {
        let config = RoomConfig {
            max_create_attempts: 0,
            min_ready_players: 0,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.max_create_attempts, 1);
        assert_eq!(config.min_ready_players, 1);
    }

    #[test]
    fn test_sync_state_transitions() {
        use SyncState::*;
        assert!(Disconnected.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Synced));
        assert!(Loading.can_transition_to(Disconnected));
        assert!(Synced.can_transition_to(Synced));
        assert!(Synced.can_transition_to(Disconnected));
        assert!(!Disconnected.can_transition_to(Synced));
        assert!(!Synced.can_transition_to(Loading));
    }

    #[test]
    fn test_sync_state_display() {
        assert_eq!(SyncState::Synced.to_string(), "Synced");
    }
}
