//! Shared data model for Turnroom.
//!
//! This crate defines everything that more than one layer needs to agree
//! on:
//!
//! - **Identifiers** ([`RoomId`], [`PlayerId`]) and the human-shareable
//!   [`RoomCode`] with its generator.
//! - **Documents** ([`Room`], [`RoomState`]): the canonical room record
//!   and the single mutable, versioned state document per room.
//! - **Change events** ([`ChangeEvent`], [`FeedFrame`]): what the
//!   realtime feed delivers and how it is framed on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how documents become
//!   bytes, both on the wire and in local persistence.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about stores, feeds, or sessions. It
//! only describes data and how to serialize it.
//!
//! ```text
//! Store / Feed (bytes, rows) → Protocol (RoomState, ChangeEvent) → Room layer
//! ```

mod code;
mod codec;
mod error;
mod types;

pub use code::{CODE_ALPHABET, DEFAULT_CODE_LENGTH, RoomCode};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ChangeEvent, ChangeKind, FeedFrame, PlayerEntry, PlayerId, Room, RoomId,
    RoomState,
};
