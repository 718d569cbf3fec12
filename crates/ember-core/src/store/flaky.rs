//! Fault-injecting store wrapper for tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use super::{InsertSubscription, RoomStore, StoreError};
use crate::types::{Room, StoredMessage};

/// Store wrapper that fails queued operations before delegating.
///
/// Each store call consumes at most one queued error; once the queue is
/// empty the wrapper is transparent. Deterministic by construction, which
/// keeps failure-path tests reproducible.
#[derive(Clone)]
pub struct FlakyStore<S> {
    inner: S,
    planned: Arc<Mutex<VecDeque<StoreError>>>,
}

impl<S> FlakyStore<S> {
    /// Wrap `inner` with an empty failure queue.
    pub fn new(inner: S) -> Self {
        Self { inner, planned: Arc::new(Mutex::new(VecDeque::new())) }
    }

    /// Queue an error to be returned by the next store call.
    #[allow(clippy::expect_used)]
    pub fn fail_next(&self, error: StoreError) {
        self.planned.lock().expect("mutex poisoned").push_back(error);
    }

    #[allow(clippy::expect_used)]
    fn take_planned(&self) -> Option<StoreError> {
        self.planned.lock().expect("mutex poisoned").pop_front()
    }
}

#[async_trait]
impl<S: RoomStore> RoomStore for FlakyStore<S> {
    async fn room_exists(&self, room_key: &str) -> Result<bool, StoreError> {
        match self.take_planned() {
            Some(err) => Err(err),
            None => self.inner.room_exists(room_key).await,
        }
    }

    async fn get_room(&self, room_key: &str) -> Result<Option<Room>, StoreError> {
        match self.take_planned() {
            Some(err) => Err(err),
            None => self.inner.get_room(room_key).await,
        }
    }

    async fn create_room(&self, room_key: &str, creator_id: &str) -> Result<Room, StoreError> {
        match self.take_planned() {
            Some(err) => Err(err),
            None => self.inner.create_room(room_key, creator_id).await,
        }
    }

    async fn list_messages(
        &self,
        room_key: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        match self.take_planned() {
            Some(err) => Err(err),
            None => self.inner.list_messages(room_key, limit).await,
        }
    }

    async fn earliest_message(
        &self,
        room_key: &str,
    ) -> Result<Option<StoredMessage>, StoreError> {
        match self.take_planned() {
            Some(err) => Err(err),
            None => self.inner.earliest_message(room_key).await,
        }
    }

    async fn append_message(
        &self,
        room_key: &str,
        sender_id: &str,
        ciphertext: &str,
    ) -> Result<StoredMessage, StoreError> {
        match self.take_planned() {
            Some(err) => Err(err),
            None => self.inner.append_message(room_key, sender_id, ciphertext).await,
        }
    }

    async fn subscribe_inserts(&self, room_key: &str) -> Result<InsertSubscription, StoreError> {
        match self.take_planned() {
            Some(err) => Err(err),
            None => self.inner.subscribe_inserts(room_key).await,
        }
    }
}
