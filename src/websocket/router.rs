use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::websocket::events::ServerEvent;
use crate::websocket::registry::{ConnectionRegistry, ConnectionSender};
use crate::websocket::rooms::RoomManager;

/// Who an event is for.
#[derive(Debug, Clone)]
pub enum Target {
    /// Every live connection of one user.
    User(Uuid),
    /// Every live member of one room, optionally minus the originating
    /// connection.
    Room {
        room_id: String,
        exclude: Option<Uuid>,
    },
    /// Every registered connection across all users.
    Broadcast,
}

/// Resolves a target selector against the registry and room manager and
/// fans the event out. Delivery is fire-and-forget through each
/// connection's channel: nothing here ever waits on a peer.
pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomManager>,
}

impl EventRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, rooms: Arc<RoomManager>) -> Self {
        Self { registry, rooms }
    }

    /// Deliver `event` to every connection the target resolves to and
    /// return how many accepted it. Zero recipients (offline user, empty
    /// room, empty process) is a silent drop, not an error. A send that
    /// fails because the connection is closing concurrently is logged
    /// and skipped; siblings still get the event.
    pub async fn dispatch(&self, event: &ServerEvent, target: Target) -> usize {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize event for dispatch: {}", e);
                return 0;
            }
        };

        let senders: Vec<ConnectionSender> = match target {
            Target::User(user_id) => self.registry.connections_for(user_id).await,
            Target::Room { room_id, exclude } => self
                .rooms
                .members_of(&room_id)
                .await
                .into_iter()
                .filter(|member| Some(member.connection_id) != exclude)
                .map(|member| member.sender)
                .collect(),
            Target::Broadcast => self.registry.all_connections().await,
        };

        let mut delivered = 0;
        for sender in senders {
            if sender.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                warn!("Dropped event for a connection that closed mid-dispatch");
            }
        }
        delivered
    }
}
