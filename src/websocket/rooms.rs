use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::websocket::registry::ConnectionSender;

/// One live subscriber of a room. Carries the user identity so that
/// departure events can name the leaver after the connection is gone.
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub connection_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub sender: ConnectionSender,
}

/// Tracks which live connections are currently subscribed to each chat
/// room. Persistent room membership lives in the main store; this map
/// only holds the subset that is connected right now. Rooms come into
/// existence on first join and vanish when the last live member leaves.
#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: RwLock<HashMap<String, HashMap<Uuid, RoomMember>>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the room's live set. Returns false if it was
    /// already subscribed (idempotent no-op).
    pub async fn join(&self, room_id: &str, member: RoomMember) -> bool {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(room_id.to_string()).or_default();
        if members.contains_key(&member.connection_id) {
            debug!("Connection {} already in room {}", member.connection_id, room_id);
            return false;
        }
        info!("Connection {} joined room {}", member.connection_id, room_id);
        members.insert(member.connection_id, member);
        true
    }

    /// Remove a connection from the room's live set. Removing an absent
    /// member is a no-op returning `None`.
    pub async fn leave(&self, room_id: &str, connection_id: Uuid) -> Option<RoomMember> {
        let mut rooms = self.rooms.write().await;
        let members = rooms.get_mut(room_id)?;
        let member = members.remove(&connection_id)?;
        if members.is_empty() {
            rooms.remove(room_id);
        }
        info!("Connection {} left room {}", connection_id, room_id);
        Some(member)
    }

    /// Current live members; empty if the room has none or never existed.
    pub async fn members_of(&self, room_id: &str) -> Vec<RoomMember> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Purge a vanished connection from every room it was in, returning
    /// the rooms that changed so departure notifications can go out.
    pub async fn leave_all(&self, connection_id: Uuid) -> Vec<String> {
        let mut rooms = self.rooms.write().await;
        let mut affected = Vec::new();
        rooms.retain(|room_id, members| {
            if members.remove(&connection_id).is_some() {
                affected.push(room_id.clone());
            }
            !members.is_empty()
        });
        if !affected.is_empty() {
            info!(
                "Connection {} purged from {} room(s) on disconnect",
                connection_id,
                affected.len()
            );
        }
        affected
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
