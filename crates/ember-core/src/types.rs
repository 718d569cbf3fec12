//! Core data model for rooms and messages.

use serde::{Deserialize, Serialize};

/// Room identifier.
///
/// Canonically six characters of `A-Z0-9`. The identifier and the secret
/// are the same value: the room key both names the room publicly and seeds
/// the symmetric encryption key, so anyone who can name the room can
/// decrypt it.
pub type RoomKey = String;

/// Locally generated, locally persisted pseudo-identity.
///
/// Not authenticated; unique per client profile. Exists in the presence
/// registry only while the client's connection is live.
pub type ClientId = String;

/// A room row as the durable store holds it.
///
/// Created exactly once, never updated, never explicitly deleted: the room
/// is logically dead once the last presence entry leaves, while the row and
/// its messages remain until an external reaper purges them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room key; doubles as the store's primary key.
    pub id: RoomKey,
    /// Logical creation timestamp assigned by the store.
    pub created_at: u64,
    /// Recorded creator, when the creating client supplied one.
    ///
    /// Absent on rooms created before creators were recorded; host
    /// resolution then falls back to the earliest message sender.
    pub creator_id: Option<ClientId>,
}

/// A message row as the durable store holds it.
///
/// The ciphertext is opaque to the store and to any relay; only holders of
/// the room key can produce plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store-assigned id, unique and increasing within a room.
    pub id: u64,
    /// Room this message belongs to.
    pub room_id: RoomKey,
    /// Sender's pseudo-identity as tagged at append time.
    pub sender_id: ClientId,
    /// Logical timestamp assigned by the store.
    pub created_at: u64,
    /// Sealed message body, opaque to the store.
    pub ciphertext: String,
}

/// Decryption outcome for one message.
///
/// Derived locally after fetch or receipt; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Decryption succeeded.
    Clear(String),
    /// Decryption failed: wrong key, corruption, or tampering. The message
    /// is shown as a placeholder; one bad row never aborts history loading.
    Undecipherable,
}

impl MessageBody {
    /// Plaintext if decryption succeeded.
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageBody::Clear(text) => Some(text),
            MessageBody::Undecipherable => None,
        }
    }
}

/// A message as the session exposes it to the UI shell: the stored row plus
/// the locally computed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Store-assigned id.
    pub id: u64,
    /// Sender's pseudo-identity.
    pub sender_id: ClientId,
    /// Logical timestamp assigned by the store.
    pub created_at: u64,
    /// Sealed body as stored.
    pub ciphertext: String,
    /// Locally computed decryption outcome.
    pub body: MessageBody,
}

impl Message {
    /// Build the session view of a stored row from its decryption outcome.
    pub fn from_stored(row: StoredMessage, body: MessageBody) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            created_at: row.created_at,
            ciphertext: row.ciphertext,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_text_exposes_clear_only() {
        assert_eq!(MessageBody::Clear("hi".into()).text(), Some("hi"));
        assert_eq!(MessageBody::Undecipherable.text(), None);
    }

    #[test]
    fn from_stored_carries_row_fields() {
        let row = StoredMessage {
            id: 3,
            room_id: "AB12CD".into(),
            sender_id: "alice".into(),
            created_at: 17,
            ciphertext: "opaque".into(),
        };

        let msg = Message::from_stored(row, MessageBody::Clear("hello".into()));

        assert_eq!(msg.id, 3);
        assert_eq!(msg.sender_id, "alice");
        assert_eq!(msg.created_at, 17);
        assert_eq!(msg.ciphertext, "opaque");
        assert_eq!(msg.body.text(), Some("hello"));
    }
}
