//! Device-local session state for Turnroom.
//!
//! Everything in this crate lives on the player's device and is never
//! synchronized with other clients:
//!
//! 1. **Identity**: a stable [`PlayerId`] generated once per device profile
//!    ([`IdentityProvider`])
//! 2. **Local profiles**: per-room cosmetic stats ([`ProfileStore`],
//!    [`LocalProfile`])
//! 3. **Entry state**: the addressable description of which room a client
//!    is in and as what ([`SessionEntry`])
//!
//! Persistence goes through an injected [`KeyValueStore`], so there are no
//! ambient globals and tests can supply a fresh [`MemoryKeyValueStore`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Facade (above)  ← resolves identity, restores entries, owns profiles
//!     ↕
//! Session Layer (this crate)  ← device identity and local state
//!     ↕
//! Protocol Layer (below)  ← PlayerId, RoomId, RoomCode, JsonCodec
//! ```
//!
//! [`PlayerId`]: turnroom_protocol::PlayerId

mod entry;
mod error;
mod identity;
mod kv;
mod profile;

pub use entry::SessionEntry;
pub use error::SessionError;
pub use identity::{IdentityProvider, PLAYER_ID_KEY};
pub use kv::{KeyValueStore, MemoryKeyValueStore};
pub use profile::{LocalProfile, PROFILE_KEY_PREFIX, ProfileStore};
