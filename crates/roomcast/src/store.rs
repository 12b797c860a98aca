//! Message persistence.
//!
//! The client calls [`MessageStore::create`] for every parsed message it
//! broadcasts, on a spawned task: delivery never waits on the store and a
//! failed write is logged, not retried.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use roomcast_protocol::{RoomId, UserId};
use serde::{Deserialize, Serialize};

/// Errors a [`MessageStore`] can report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request was rejected before reaching storage.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No message with this id exists in the room.
    #[error("message {0} not found")]
    NotFound(u64),

    /// The storage backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Store-assigned id. Increases with insertion order.
    pub id: u64,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: SystemTime,
}

/// Persists chat messages.
///
/// Implementations must be shareable across tasks; the client holds one
/// behind an `Arc` and calls it from a spawned task.
pub trait MessageStore: Send + Sync + 'static {
    /// Stores one message and returns it as persisted.
    ///
    /// # Errors
    /// `StoreError::InvalidRequest` if `room_id` or `user_id` is empty,
    /// `StoreError::Backend` if the write fails.
    fn create(
        &self,
        room_id: RoomId,
        user_id: UserId,
        content: String,
    ) -> impl std::future::Future<Output = Result<StoredMessage, StoreError>> + Send;
}

fn check_valid_request(room_id: &RoomId, user_id: &UserId) -> Result<(), StoreError> {
    if room_id.is_empty() {
        return Err(StoreError::InvalidRequest("room id can't be empty".into()));
    }
    if user_id.is_empty() {
        return Err(StoreError::InvalidRequest("user id can't be empty".into()));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    rooms: HashMap<RoomId, Vec<StoredMessage>>,
}

/// A [`MessageStore`] that keeps everything in process memory.
///
/// Messages are kept per room in insertion order, so history pages are
/// slices of one vector.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the newest `limit` messages in `room_id`, oldest first.
    pub fn list_recent(&self, room_id: &RoomId, limit: usize) -> Vec<StoredMessage> {
        let inner = self.lock();
        let Some(messages) = inner.rooms.get(room_id) else {
            return Vec::new();
        };
        let start = messages.len().saturating_sub(limit);
        messages[start..].to_vec()
    }

    /// Returns up to `limit` messages older than `before_id`, oldest first.
    ///
    /// Pass the id of the oldest message already shown to page backwards.
    pub fn list_before(&self, room_id: &RoomId, before_id: u64, limit: usize) -> Vec<StoredMessage> {
        let inner = self.lock();
        let Some(messages) = inner.rooms.get(room_id) else {
            return Vec::new();
        };
        let end = messages.partition_point(|m| m.id < before_id);
        let start = end.saturating_sub(limit);
        messages[start..end].to_vec()
    }

    /// Deletes one message from a room.
    ///
    /// # Errors
    /// `InvalidRequest` for empty ids, `NotFound` if the room has no such
    /// message.
    pub fn delete(&self, room_id: &RoomId, user_id: &UserId, message_id: u64) -> Result<(), StoreError> {
        check_valid_request(room_id, user_id)?;
        let mut inner = self.lock();
        let messages = inner
            .rooms
            .get_mut(room_id)
            .ok_or(StoreError::NotFound(message_id))?;
        let index = messages
            .binary_search_by_key(&message_id, |m| m.id)
            .map_err(|_| StoreError::NotFound(message_id))?;
        messages.remove(index);
        Ok(())
    }

    /// Number of messages stored for `room_id`.
    pub fn count(&self, room_id: &RoomId) -> usize {
        self.lock().rooms.get(room_id).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MessageStore for InMemoryStore {
    async fn create(
        &self,
        room_id: RoomId,
        user_id: UserId,
        content: String,
    ) -> Result<StoredMessage, StoreError> {
        check_valid_request(&room_id, &user_id)?;

        let mut inner = self.lock();
        inner.next_id += 1;
        let message = StoredMessage {
            id: inner.next_id,
            room_id: room_id.clone(),
            user_id,
            content,
            created_at: SystemTime::now(),
        };
        inner.rooms.entry(room_id).or_default().push(message.clone());
        Ok(message)
    }
}
