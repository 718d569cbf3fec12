//! In-memory store implementation for testing and simulation.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{InsertSubscription, RoomStore, StoreError};
use crate::types::{Room, StoredMessage};

/// In-memory room/message store.
///
/// `HashMap` rows behind `Arc<Mutex<>>` so clones share one backend, the
/// same way multiple sessions point at one database. Timestamps are a
/// logical counter, not wall-clock time, which keeps tests deterministic.
///
/// # Panics
///
/// Operations panic if the internal mutex is poisoned (a thread panicked
/// while holding the lock). Acceptable for test/simulation code.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Room rows keyed by room key.
    rooms: HashMap<String, Room>,

    /// Message rows per room, in append order.
    messages: HashMap<String, Vec<StoredMessage>>,

    /// Insert watchers per room. Closed channels are pruned on append.
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<StoredMessage>>>,

    /// Logical clock for store-assigned timestamps.
    clock: u64,

    /// Next store-assigned message id.
    next_message_id: u64,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a room row with no recorded creator.
    ///
    /// Mirrors rows created before creators were recorded; host resolution
    /// for such rooms falls back to the earliest message sender.
    #[allow(clippy::expect_used)]
    pub fn create_room_unattributed(&self, room_key: &str) -> Result<Room, StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");
        if inner.rooms.contains_key(room_key) {
            return Err(StoreError::AlreadyExists { room_key: room_key.to_string() });
        }

        inner.clock += 1;
        let room =
            Room { id: room_key.to_string(), created_at: inner.clock, creator_id: None };
        inner.rooms.insert(room_key.to_string(), room.clone());
        Ok(room)
    }

    /// Number of room rows. Useful for debugging and testing.
    #[allow(clippy::expect_used)]
    pub fn room_count(&self) -> usize {
        self.inner.lock().expect("mutex poisoned").rooms.len()
    }

    /// Drop every insert watcher for a room, closing their channels.
    ///
    /// Simulates the realtime substrate disconnecting while the durable
    /// rows stay intact.
    #[allow(clippy::expect_used)]
    pub fn drop_insert_watchers(&self, room_key: &str) {
        self.inner.lock().expect("mutex poisoned").watchers.remove(room_key);
    }

    /// Total message rows across all rooms. Useful for debugging and
    /// testing.
    #[allow(clippy::expect_used)]
    pub fn total_message_count(&self) -> usize {
        let inner = self.inner.lock().expect("mutex poisoned");
        inner.messages.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    #[allow(clippy::expect_used)]
    async fn room_exists(&self, room_key: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().expect("mutex poisoned").rooms.contains_key(room_key))
    }

    #[allow(clippy::expect_used)]
    async fn get_room(&self, room_key: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.inner.lock().expect("mutex poisoned").rooms.get(room_key).cloned())
    }

    #[allow(clippy::expect_used)]
    async fn create_room(&self, room_key: &str, creator_id: &str) -> Result<Room, StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");

        // Uniqueness violation for the race loser, as a real unique index
        // would surface it.
        if inner.rooms.contains_key(room_key) {
            return Err(StoreError::AlreadyExists { room_key: room_key.to_string() });
        }

        inner.clock += 1;
        let room = Room {
            id: room_key.to_string(),
            created_at: inner.clock,
            creator_id: Some(creator_id.to_string()),
        };
        inner.rooms.insert(room_key.to_string(), room.clone());

        tracing::debug!(room_key, creator_id, "created room row");
        Ok(room)
    }

    #[allow(clippy::expect_used)]
    async fn list_messages(
        &self,
        room_key: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let inner = self.inner.lock().expect("mutex poisoned");

        if !inner.rooms.contains_key(room_key) {
            return Err(StoreError::RoomNotFound { room_key: room_key.to_string() });
        }

        // Trailing window: the most recent rows, still oldest-first.
        Ok(inner
            .messages
            .get(room_key)
            .map(|rows| rows[rows.len().saturating_sub(limit)..].to_vec())
            .unwrap_or_default())
    }

    #[allow(clippy::expect_used)]
    async fn earliest_message(
        &self,
        room_key: &str,
    ) -> Result<Option<StoredMessage>, StoreError> {
        let inner = self.inner.lock().expect("mutex poisoned");

        if !inner.rooms.contains_key(room_key) {
            return Err(StoreError::RoomNotFound { room_key: room_key.to_string() });
        }

        Ok(inner.messages.get(room_key).and_then(|rows| rows.first()).cloned())
    }

    #[allow(clippy::expect_used)]
    async fn append_message(
        &self,
        room_key: &str,
        sender_id: &str,
        ciphertext: &str,
    ) -> Result<StoredMessage, StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");

        if !inner.rooms.contains_key(room_key) {
            return Err(StoreError::RoomNotFound { room_key: room_key.to_string() });
        }

        inner.clock += 1;
        inner.next_message_id += 1;
        let row = StoredMessage {
            id: inner.next_message_id,
            room_id: room_key.to_string(),
            sender_id: sender_id.to_string(),
            created_at: inner.clock,
            ciphertext: ciphertext.to_string(),
        };

        inner.messages.entry(room_key.to_string()).or_default().push(row.clone());

        // Notify live subscribers, dropping the ones that went away.
        if let Some(watchers) = inner.watchers.get_mut(room_key) {
            watchers.retain(|tx| tx.send(row.clone()).is_ok());
        }

        Ok(row)
    }

    #[allow(clippy::expect_used)]
    async fn subscribe_inserts(&self, room_key: &str) -> Result<InsertSubscription, StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");

        if !inner.rooms.contains_key(room_key) {
            return Err(StoreError::RoomNotFound { room_key: room_key.to_string() });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        inner.watchers.entry(room_key.to_string()).or_default().push(tx);

        Ok(InsertSubscription::new(rx))
    }
}
