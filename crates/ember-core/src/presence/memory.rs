//! In-memory presence registry for testing and simulation.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{PresenceChannel, PresenceHandle, PresenceMeta, PresenceSnapshot};
use crate::store::StoreError;

/// In-memory presence registry.
///
/// Clones share one registry via `Arc`, so several handles subscribed to
/// the same room observe each other — enough to exercise join, announce,
/// refuse-at-capacity, and leave flows without a realtime backend. Each
/// key holds one live connection here; multi-connection snapshots are
/// exercised against the roster directly.
///
/// # Panics
///
/// Operations panic if the internal mutex is poisoned. Acceptable for
/// test/simulation code.
#[derive(Clone, Default)]
pub struct MemoryPresence {
    inner: Arc<Mutex<MemoryPresenceInner>>,
}

#[derive(Default)]
struct MemoryPresenceInner {
    rooms: HashMap<String, RoomPresence>,
    next_watcher_id: u64,
}

#[derive(Default)]
struct RoomPresence {
    /// Announced entries: client key to metadata records.
    entries: PresenceSnapshot,
    /// Sync watchers. Closed channels are pruned on broadcast.
    watchers: Vec<(u64, mpsc::UnboundedSender<PresenceSnapshot>)>,
}

impl MemoryPresence {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of announced occupants in a room. Useful for tests.
    #[allow(clippy::expect_used)]
    pub fn occupant_count(&self, room_key: &str) -> usize {
        let inner = self.inner.lock().expect("mutex poisoned");
        inner.rooms.get(room_key).map_or(0, |room| room.entries.len())
    }

    fn broadcast(inner: &mut MemoryPresenceInner, room_key: &str) {
        if let Some(room) = inner.rooms.get_mut(room_key) {
            let snapshot = room.entries.clone();
            room.watchers.retain(|(_, tx)| tx.send(snapshot.clone()).is_ok());
        }
    }
}

#[async_trait]
impl PresenceChannel for MemoryPresence {
    type Handle = MemoryPresenceHandle;

    #[allow(clippy::expect_used)]
    async fn subscribe(
        &self,
        room_key: &str,
        client_key: &str,
    ) -> Result<Self::Handle, StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");

        inner.next_watcher_id += 1;
        let watcher_id = inner.next_watcher_id;

        let (tx, rx) = mpsc::unbounded_channel();
        let room = inner.rooms.entry(room_key.to_string()).or_default();

        // New subscribers get the current state as their first sync event,
        // the way realtime presence substrates behave.
        let _ = tx.send(room.entries.clone());
        room.watchers.push((watcher_id, tx));

        Ok(MemoryPresenceHandle {
            registry: self.clone(),
            room_key: room_key.to_string(),
            client_key: client_key.to_string(),
            watcher_id,
            tracked: AtomicBool::new(false),
            rx,
        })
    }
}

/// Handle to one client's subscription in a [`MemoryPresence`] registry.
pub struct MemoryPresenceHandle {
    registry: MemoryPresence,
    room_key: String,
    client_key: String,
    watcher_id: u64,
    tracked: AtomicBool,
    rx: mpsc::UnboundedReceiver<PresenceSnapshot>,
}

#[async_trait]
impl PresenceHandle for MemoryPresenceHandle {
    #[allow(clippy::expect_used)]
    async fn snapshot(&self) -> PresenceSnapshot {
        let inner = self.registry.inner.lock().expect("mutex poisoned");
        inner.rooms.get(&self.room_key).map(|room| room.entries.clone()).unwrap_or_default()
    }

    #[allow(clippy::expect_used)]
    async fn track(&self, meta: PresenceMeta) -> Result<(), StoreError> {
        let mut inner = self.registry.inner.lock().expect("mutex poisoned");

        let room = inner.rooms.entry(self.room_key.clone()).or_default();
        room.entries.insert(self.client_key.clone(), vec![meta]);
        self.tracked.store(true, Ordering::Relaxed);

        MemoryPresence::broadcast(&mut inner, &self.room_key);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    async fn untrack(&self) {
        let mut inner = self.registry.inner.lock().expect("mutex poisoned");

        if let Some(room) = inner.rooms.get_mut(&self.room_key) {
            room.entries.remove(&self.client_key);
        }
        self.tracked.store(false, Ordering::Relaxed);

        MemoryPresence::broadcast(&mut inner, &self.room_key);
    }

    async fn next_sync(&mut self) -> Option<PresenceSnapshot> {
        self.rx.recv().await
    }
}

impl Drop for MemoryPresenceHandle {
    #[allow(clippy::expect_used)]
    fn drop(&mut self) {
        let mut inner = self.registry.inner.lock().expect("mutex poisoned");

        if let Some(room) = inner.rooms.get_mut(&self.room_key) {
            room.watchers.retain(|(id, _)| *id != self.watcher_id);
            // Connection dropped: the announced entry vanishes immediately.
            if self.tracked.load(Ordering::Relaxed) {
                room.entries.remove(&self.client_key);
            }
        }

        MemoryPresence::broadcast(&mut inner, &self.room_key);
    }
}
