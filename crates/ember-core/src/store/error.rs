//! Store error types.

use thiserror::Error;

/// Errors from [`super::RoomStore`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The room row does not exist.
    #[error("room not found: {room_key}")]
    RoomNotFound {
        /// Room key that was looked up.
        room_key: String,
    },

    /// Room creation lost a race: a row with this key already exists.
    ///
    /// Distinguishable from generic failure because the likely caller
    /// response is "just join it".
    #[error("room already exists: {room_key}")]
    AlreadyExists {
        /// Room key that collided.
        room_key: String,
    },

    /// Room creation throttled by the backend. Recoverable; the caller may
    /// retry later.
    #[error("room creation rate limited, try again later")]
    RateLimited,

    /// Transport or backend failure.
    #[error("store I/O error: {0}")]
    Io(String),
}
