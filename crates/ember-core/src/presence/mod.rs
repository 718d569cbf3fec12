//! Presence registry abstraction.
//!
//! The presence registry is external live state: who is connected to a room
//! right now. The roster is a read-only projection over it, so the traits
//! here stay narrow — subscribe, snapshot, track — and the session never
//! writes another client's entry. A client's entry vanishes the instant its
//! connection drops; there is no grace period.

mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
pub use memory::{MemoryPresence, MemoryPresenceHandle};
use serde::{Deserialize, Serialize};

use crate::{store::StoreError, types::ClientId};

/// Metadata a client announces about itself when joining a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMeta {
    /// Self-chosen display name, shown to other occupants.
    pub display_name: String,
}

/// Live presence state for one room: participant key to that key's
/// metadata records, possibly several when one key holds multiple
/// connections, possibly none when a key joined without announcing.
pub type PresenceSnapshot = HashMap<ClientId, Vec<PresenceMeta>>;

/// Connection to a presence registry.
#[async_trait]
pub trait PresenceChannel: Clone + Send + Sync + 'static {
    /// Per-subscription handle type.
    type Handle: PresenceHandle;

    /// Join the registry for `room_key` under `client_key`.
    ///
    /// Subscribing observes the room; it does not announce presence. The
    /// caller decides separately whether to [`PresenceHandle::track`],
    /// which is what lets a session refuse to announce into a full room
    /// while still watching it.
    async fn subscribe(&self, room_key: &str, client_key: &str)
    -> Result<Self::Handle, StoreError>;
}

/// One client's live subscription to a room's presence state.
///
/// Dropping the handle leaves the room: the watcher is removed and any
/// tracked entry vanishes immediately.
#[async_trait]
pub trait PresenceHandle: Send {
    /// Current snapshot of the room's presence state.
    async fn snapshot(&self) -> PresenceSnapshot;

    /// Announce this client's presence with `meta`.
    ///
    /// The registry entry keyed by our client key is exclusively ours;
    /// re-tracking replaces our previous metadata.
    async fn track(&self, meta: PresenceMeta) -> Result<(), StoreError>;

    /// Withdraw this client's announced presence, keeping the
    /// subscription.
    async fn untrack(&self);

    /// Next presence-sync snapshot.
    ///
    /// Snapshots are idempotent full states, so repeated or out-of-order
    /// delivery is harmless. Returns `None` once the registry side closed.
    async fn next_sync(&mut self) -> Option<PresenceSnapshot>;
}
