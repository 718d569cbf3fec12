//! Events delivered into the session's serialized dispatch queue.

use ember_core::{PresenceSnapshot, StoredMessage};

/// An inbound event for one room session.
///
/// Both subscriptions deliver through [`crate::RoomSession::next_event`],
/// which serializes them onto one logical queue; the caller feeds each
/// event to [`crate::RoomSession::handle_event`] in turn.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A message row was appended to the room.
    ///
    /// Delivered in substrate order, at-least-once; the session appends in
    /// arrival order without deduplication or re-sorting.
    MessageInserted(StoredMessage),

    /// The presence registry published a fresh snapshot.
    ///
    /// Snapshots are idempotent full states; the roster is recomputed from
    /// scratch on each one.
    PresenceSynced(PresenceSnapshot),
}
