//! Ember Client
//!
//! The orchestrating state machine for one ephemeral encrypted room. A
//! [`RoomSession`] is bound to a single room key: it validates the key,
//! checks the room against the external store, loads and decrypts history,
//! folds presence events into a roster, and exposes the send/create
//! operations the UI shell calls.
//!
//! # Architecture
//!
//! The session is driven by a single serialized event queue. The two live
//! subscriptions (message inserts, presence syncs) both deliver into
//! [`RoomSession::next_event`]; the caller loops over it and feeds each
//! event back through [`RoomSession::handle_event`]. No two handlers run
//! concurrently against the same session, so the only internal flag is the
//! send-in-flight bit.
//!
//! ```text
//! Unvalidated → {Invalid, Checking} → {NotFound, Loading} → Ready → Closed
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod event;
mod identity;
mod session;

pub use error::SessionError;
pub use event::SessionEvent;
pub use identity::{ClientIdentity, IdentityStore, IdentityStoreError, MemoryIdentityStore};
pub use session::{HISTORY_LIMIT, RoomSession, SessionState};
