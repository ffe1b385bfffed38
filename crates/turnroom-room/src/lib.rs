//! Room session and state synchronization for Turnroom.
//!
//! Everything a client does with a room, on top of the backend seams in
//! `turnroom-store`:
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms with unique codes
//! - [`JoinCoordinator`]: resolves codes and appends the local player to
//!   the roster with versioned writes
//! - [`Synchronizer`]: mirrors a room's state from the change feed and
//!   publishes local changes
//! - [`TurnAdvance`]: host-only hold-to-advance turn control
//! - [`Teardown`]: best-effort leave
//! - [`RoomConfig`]: codes, retries, readiness threshold

mod config;
mod error;
mod join;
mod registry;
mod sync;
mod teardown;
mod turn;

pub use config::{RoomConfig, SyncState};
pub use error::RoomError;
pub use join::{JoinCoordinator, JoinPath};
pub use registry::RoomRegistry;
pub use sync::{PublishOutcome, SyncOutcome, Synchronizer};
pub use teardown::{LeaveRemote, SessionExit, Teardown};
pub use turn::{TurnAdvance, TurnOutcome};
