//! # Turnroom
//!
//! Shared turn-and-roster rooms, synchronized across devices.
//!
//! A host creates a room and shares its short code out of band. Other
//! players join with the code, every client mirrors the room's versioned
//! state document from a change feed, and the host advances the shared
//! turn with a hold-to-confirm gesture.
//!
//! This crate ties the layers together: [`TurnroomClient`] resolves the
//! device identity and opens rooms; each open room is a [`RoomSession`]
//! whose [`next_update`](RoomSession::next_update) drives both the feed and
//! the hold timer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use turnroom::prelude::*;
//!
//! # async fn run() -> Result<(), TurnroomError> {
//! turnroom::init_tracing();
//!
//! let store = MemoryStore::new();
//! let client = TurnroomClient::builder().build(store, MemoryKeyValueStore::new())?;
//! let mut session = client.create_room().await?;
//! println!("share this code: {}", session.entry().code);
//!
//! while let Some(update) = session.next_update().await {
//!     if let SessionUpdate::Ended(exit) = update {
//!         println!("session over: {exit:?}");
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod session;
mod telemetry;

pub use client::{ClientConfig, TurnroomClient, TurnroomClientBuilder};
pub use error::TurnroomError;
pub use session::{RoomSession, SessionUpdate};
pub use telemetry::{init_tracing, init_tracing_with};

/// The types most applications need.
pub mod prelude {
    pub use crate::{
        ClientConfig, RoomSession, SessionUpdate, TurnroomClient, TurnroomClientBuilder,
        TurnroomError,
    };
    pub use turnroom_hold::{HoldConfig, HoldPhase};
    pub use turnroom_protocol::{PlayerId, Room, RoomCode, RoomId, RoomState};
    pub use turnroom_room::{
        JoinPath, LeaveRemote, RoomConfig, SessionExit, SyncState, TurnOutcome,
    };
    pub use turnroom_session::{
        KeyValueStore, LocalProfile, MemoryKeyValueStore, SessionEntry,
    };
    pub use turnroom_store::{Backend, MemoryStore};
}
