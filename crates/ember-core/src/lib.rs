//! Ember Core
//!
//! Data model and substrate abstractions for ephemeral encrypted rooms.
//!
//! # Architecture
//!
//! ```text
//! RoomSession (ember-client)
//!   ├─ RoomStore (durable append-only rows)      ← trait, THIS CRATE
//!   ├─ PresenceChannel (live membership)         ← trait, THIS CRATE
//!   └─ Roster (fold over presence snapshots)     ← pure, THIS CRATE
//! ```
//!
//! The durable store and the presence registry are external collaborators.
//! This crate defines the narrow interfaces the session consumes, plus
//! in-memory implementations ([`MemoryStore`], [`MemoryPresence`]) used by
//! tests and simulation. The roster is a pure projection over a presence
//! snapshot, so it stays independently testable.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod presence;
pub mod roster;
pub mod store;
mod types;

pub use presence::{MemoryPresence, PresenceChannel, PresenceHandle, PresenceMeta, PresenceSnapshot};
pub use roster::{HostPolicy, Participant, ROOM_CAPACITY, Roster};
pub use store::{FlakyStore, InsertSubscription, MemoryStore, RoomStore, StoreError};
pub use types::{ClientId, Message, MessageBody, Room, RoomKey, StoredMessage};
