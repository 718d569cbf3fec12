//! Durable store abstraction for rooms and messages.
//!
//! The backing store is an external collaborator: an append-only row store
//! with insert notifications. This module defines the narrow async trait the
//! session consumes, plus [`MemoryStore`] for tests and simulation and
//! [`FlakyStore`] for fault injection.

mod error;
mod flaky;
mod memory;

use async_trait::async_trait;
pub use error::StoreError;
pub use flaky::FlakyStore;
pub use memory::MemoryStore;
use tokio::sync::mpsc;

use crate::types::{Room, StoredMessage};

/// A live subscription to message inserts for one room.
///
/// Dropping the subscription unsubscribes; the store stops delivering into
/// it and prunes the closed channel.
pub struct InsertSubscription {
    rx: mpsc::UnboundedReceiver<StoredMessage>,
}

impl InsertSubscription {
    /// Wrap a receiver handed out by a store implementation.
    pub fn new(rx: mpsc::UnboundedReceiver<StoredMessage>) -> Self {
        Self { rx }
    }

    /// Next inserted message, in the order the substrate delivers them.
    ///
    /// Returns `None` once the store side has closed the channel.
    pub async fn recv(&mut self) -> Option<StoredMessage> {
        self.rx.recv().await
    }
}

/// Append-only room/message store.
///
/// Implementations share state across clones (the in-memory one via `Arc`),
/// mirroring how multiple sessions point at one backend. Rows are
/// multi-writer append-only: no client ever updates another client's
/// message or room row.
#[async_trait]
pub trait RoomStore: Clone + Send + Sync + 'static {
    /// Whether a room row exists for `room_key`.
    async fn room_exists(&self, room_key: &str) -> Result<bool, StoreError>;

    /// Fetch the room row, or `None` when absent.
    async fn get_room(&self, room_key: &str) -> Result<Option<Room>, StoreError>;

    /// Insert a room row with `creator_id` recorded as creator.
    ///
    /// # Errors
    ///
    /// - [`StoreError::AlreadyExists`] when another client won the creation
    ///   race for this key
    /// - [`StoreError::RateLimited`] when the backend throttles creation
    async fn create_room(&self, room_key: &str, creator_id: &str) -> Result<Room, StoreError>;

    /// The most recent `limit` messages for a room, oldest-first within the
    /// window. Rooms with deeper history keep their older rows in the
    /// store; they are just not returned here.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RoomNotFound`] when the room row is absent.
    async fn list_messages(
        &self,
        room_key: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    /// The earliest message in a room, if any. Host inference uses this,
    /// since the earliest row may have fallen out of the
    /// [`list_messages`](Self::list_messages) window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RoomNotFound`] when the room row is absent.
    async fn earliest_message(
        &self,
        room_key: &str,
    ) -> Result<Option<StoredMessage>, StoreError>;

    /// Append a sealed message, tagged with `sender_id`.
    ///
    /// The returned row carries the store-assigned id and timestamp.
    async fn append_message(
        &self,
        room_key: &str,
        sender_id: &str,
        ciphertext: &str,
    ) -> Result<StoredMessage, StoreError>;

    /// Open an insert subscription for a room.
    ///
    /// Delivery is at-least-once in substrate order; the reader does not
    /// deduplicate.
    async fn subscribe_inserts(&self, room_key: &str) -> Result<InsertSubscription, StoreError>;
}
