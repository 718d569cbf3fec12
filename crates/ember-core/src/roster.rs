//! Roster computation over presence snapshots.
//!
//! The roster is a pure fold over the presence registry's live state. It is
//! recomputed from scratch on every presence-sync event, which makes it
//! idempotent and order-independent: re-running on the same snapshot yields
//! the same roster regardless of key iteration order.

use crate::{
    presence::PresenceSnapshot,
    types::{ClientId, StoredMessage},
};

/// Maximum concurrent occupants before a room is considered full.
pub const ROOM_CAPACITY: usize = 50;

/// Length of the fallback display name derived from a participant key.
const FALLBACK_NAME_LEN: usize = 8;

/// How the room's host was determined.
///
/// Kept as an explicit tagged value rather than an implicit conditional so
/// host election stays visible and testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPolicy {
    /// The room row records its creator.
    Recorded(ClientId),
    /// No creator recorded; the sender of the earliest message is treated
    /// as host.
    InferredFromHistory(ClientId),
    /// No creator recorded and no messages to infer from.
    Unknown,
}

impl HostPolicy {
    /// Resolve the policy for a room given its recorded creator and its
    /// earliest message, if any.
    pub fn resolve(creator_id: Option<ClientId>, earliest: Option<&StoredMessage>) -> Self {
        match (creator_id, earliest) {
            (Some(id), _) => HostPolicy::Recorded(id),
            (None, Some(msg)) => HostPolicy::InferredFromHistory(msg.sender_id.clone()),
            (None, None) => HostPolicy::Unknown,
        }
    }

    /// The elected host's id, if one was resolved.
    pub fn host_id(&self) -> Option<&str> {
        match self {
            HostPolicy::Recorded(id) | HostPolicy::InferredFromHistory(id) => Some(id),
            HostPolicy::Unknown => None,
        }
    }

    /// Whether `client_id` is the elected host.
    pub fn is_host(&self, client_id: &str) -> bool {
        self.host_id() == Some(client_id)
    }
}

/// One current room occupant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Presence key, i.e. the occupant's pseudo-identity.
    pub client_id: ClientId,
    /// Display name from the first metadata record, or a truncation of the
    /// key when no metadata was tracked.
    pub display_name: String,
    /// True for at most one participant per roster.
    pub is_host: bool,
}

/// Computed list of current participants with roles.
///
/// Derived, never persisted; recomputed on every presence-sync event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Roster {
    /// Participants ordered by `client_id` for deterministic output.
    pub participants: Vec<Participant>,
    /// Number of distinct live presence keys.
    pub count: usize,
    /// True when `count` has reached [`ROOM_CAPACITY`].
    pub full: bool,
}

impl Roster {
    /// Fold a presence snapshot into a roster.
    ///
    /// For each distinct key the first metadata record is authoritative
    /// display data; a key with no metadata still counts and gets a
    /// fallback name truncated from its id.
    pub fn from_snapshot(snapshot: &PresenceSnapshot, host: &HostPolicy) -> Self {
        let mut participants: Vec<Participant> = snapshot
            .iter()
            .map(|(key, metas)| Participant {
                client_id: key.clone(),
                display_name: metas
                    .first()
                    .map_or_else(|| fallback_name(key), |meta| meta.display_name.clone()),
                is_host: host.is_host(key),
            })
            .collect();

        // Snapshot maps carry no order; sort so equal snapshots always
        // produce identical rosters.
        participants.sort_by(|a, b| a.client_id.cmp(&b.client_id));

        let count = participants.len();
        Self { participants, count, full: count >= ROOM_CAPACITY }
    }
}

fn fallback_name(key: &str) -> String {
    key.chars().take(FALLBACK_NAME_LEN).collect()
}
