//! Room manager: the process-wide registry from room id to running room.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use roomcast_protocol::RoomId;

use crate::room::spawn_room;
use crate::{RoomConfig, RoomError, RoomHandle, RoomInfo};

/// Tracks every room by id and creates rooms on first use.
///
/// Shared by all connection handlers (wrap it in an `Arc`). Lookups take
/// a read lock; creation takes the write lock and checks again, so two
/// concurrent first requests for the same id end up in one room.
pub struct RoomManager {
    rooms: RwLock<HashMap<RoomId, RoomHandle>>,
    config: RoomConfig,
}

impl RoomManager {
    /// Creates a new, empty room manager.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Returns the room registered under `room_id`, starting it if there
    /// is none.
    ///
    /// The registry lock is never held across an await.
    pub fn get_room(&self, room_id: &RoomId) -> RoomHandle {
        let existing = self.read().get(room_id).cloned();
        if let Some(handle) = existing {
            return handle;
        }

        let mut rooms = self.write();
        if let Some(handle) = rooms.get(room_id) {
            return handle.clone();
        }

        let handle = spawn_room(room_id.clone(), &self.config);
        rooms.insert(room_id.clone(), handle.clone());
        tracing::info!(%room_id, rooms = rooms.len(), "room created");
        handle
    }

    /// Drops the registry entry for `room_id`.
    ///
    /// Does not stop the room: clients holding its handle keep using it.
    /// The next `get_room` for the same id starts a fresh room.
    pub fn remove_room(&self, room_id: &RoomId) -> Result<(), RoomError> {
        self.take(room_id).map(|_| ())
    }

    /// Removes `room_id` from the registry and cancels the room.
    pub fn shutdown_room(&self, room_id: &RoomId) -> Result<(), RoomError> {
        let handle = self.take(room_id)?;
        handle.cancel();
        Ok(())
    }

    /// Cancels every registered room and empties the registry.
    pub fn shutdown(&self) {
        let drained: Vec<RoomHandle> = self.write().drain().map(|(_, handle)| handle).collect();
        for handle in &drained {
            handle.cancel();
        }
        tracing::info!(rooms = drained.len(), "all rooms shut down");
    }

    /// Queries every registered room for its info.
    ///
    /// Rooms that fail to respond (already stopped) are skipped.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let handles = self.room_handles();
        let mut infos = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(info) = handle.info().await {
                infos.push(info);
            }
        }
        infos
    }

    /// Returns cloned handles to all registered rooms.
    pub fn room_handles(&self) -> Vec<RoomHandle> {
        self.read().values().cloned().collect()
    }

    /// Returns `true` if a room is registered under `room_id`.
    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.read().contains_key(room_id)
    }

    /// Returns the number of registered rooms.
    pub fn room_count(&self) -> usize {
        self.read().len()
    }

    /// Lists all registered room IDs.
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.read().keys().cloned().collect()
    }

    fn take(&self, room_id: &RoomId) -> Result<RoomHandle, RoomError> {
        let handle = self
            .write()
            .remove(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;
        tracing::info!(%room_id, "room removed");
        Ok(handle)
    }

    // A panic while holding the lock can't leave the map half-updated, so
    // a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<RoomId, RoomHandle>> {
        self.rooms.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RoomId, RoomHandle>> {
        self.rooms.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_room_creates_once() {
        let manager = RoomManager::default();
        let id = RoomId::from("r1");

        let first = manager.get_room(&id);
        let second = manager.get_room(&id);

        assert!(first.same_room(&second));
        assert_eq!(manager.room_count(), 1);
        assert!(manager.contains(&id));
    }

    #[tokio::test]
    async fn test_different_ids_get_different_rooms() {
        let manager = RoomManager::default();
        let a = manager.get_room(&RoomId::from("a"));
        let b = manager.get_room(&RoomId::from("b"));

        assert!(!a.same_room(&b));
        let mut ids = manager.room_ids();
        ids.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(ids, vec![RoomId::from("a"), RoomId::from("b")]);
    }

    #[tokio::test]
    async fn test_remove_room_leaves_room_running() {
        let manager = RoomManager::default();
        let id = RoomId::from("r1");
        let old = manager.get_room(&id);

        manager.remove_room(&id).unwrap();
        assert_eq!(manager.room_count(), 0);
        assert!(!old.is_stopped());

        let fresh = manager.get_room(&id);
        assert!(!fresh.same_room(&old));
    }

    #[tokio::test]
    async fn test_shutdown_room_stops_it() {
        let manager = RoomManager::default();
        let id = RoomId::from("r1");
        let handle = manager.get_room(&id);

        manager.shutdown_room(&id).unwrap();
        handle.stopped().await;

        assert!(handle.is_stopped());
        assert!(!manager.contains(&id));
        assert!(matches!(
            manager.shutdown_room(&id),
            Err(RoomError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_rooms() {
        let manager = RoomManager::default();
        manager.get_room(&RoomId::from("a"));
        manager.get_room(&RoomId::from("b"));

        let infos = manager.list_rooms().await;
        assert_eq!(infos.len(), 2);
        assert!(infos.iter().all(|info| info.member_count == 0));
    }
}
