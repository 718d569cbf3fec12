//! Session error taxonomy.

use ember_core::StoreError;
use ember_crypto::EncryptionError;
use thiserror::Error;

/// Errors surfaced by [`crate::RoomSession`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The room key fails the canonical format check.
    #[error("malformed room key")]
    InvalidKey,

    /// The key is well-formed but no room row exists. The caller may offer
    /// room creation instead.
    #[error("room not found")]
    NotFound,

    /// Room creation lost the race: another client created this key first.
    /// The likely caller response is "just join it".
    #[error("room already exists")]
    AlreadyExists,

    /// Room creation throttled by the backend; retry later.
    #[error("room creation rate limited, try again later")]
    RateLimited,

    /// The room is at capacity and this client is not the host.
    #[error("room is full")]
    RoomFull,

    /// The operation requires a state the session is not in.
    #[error("session not ready")]
    NotReady,

    /// Rejected before any store call: blank message text.
    #[error("message is empty")]
    EmptyMessage,

    /// Rejected before any store call: a send is already in flight.
    #[error("another send is in flight")]
    SendInFlight,

    /// Sealing the outgoing message failed.
    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    /// The store call itself failed.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}
