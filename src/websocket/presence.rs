use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::websocket::events::{PresenceStatus, ServerEvent};
use crate::websocket::registry::{ConnectionRegistry, ConnectionSender, Deregistration};
use crate::websocket::rooms::RoomManager;
use crate::websocket::router::{EventRouter, Target};

/// Orchestrates the connect/disconnect lifecycle: registry bookkeeping,
/// presence announcements, and room reconciliation when a connection
/// vanishes.
pub struct PresenceCoordinator {
    registry: Arc<ConnectionRegistry>,
    rooms: Arc<RoomManager>,
    router: Arc<EventRouter>,
}

impl PresenceCoordinator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        rooms: Arc<RoomManager>,
        router: Arc<EventRouter>,
    ) -> Self {
        Self {
            registry,
            rooms,
            router,
        }
    }

    /// Called once the handshake has resolved a user identity: makes the
    /// connection reachable and announces presence to everyone.
    pub async fn connection_online(
        &self,
        user_id: Uuid,
        connection_id: Uuid,
        sender: ConnectionSender,
    ) {
        self.registry.register(user_id, connection_id, sender).await;
        self.router
            .dispatch(
                &ServerEvent::PresenceChanged {
                    user_id,
                    status: PresenceStatus::Online,
                },
                Target::Broadcast,
            )
            .await;
    }

    /// Called exactly once per connection when it goes away, whatever
    /// the reason (clean close, network error, heartbeat timeout).
    /// Safe to call again: the registry is idempotent and the second
    /// call finds nothing to do.
    pub async fn connection_closed(&self, connection_id: Uuid, username: &str) {
        let Some(Deregistration {
            user_id,
            last_connection,
        }) = self.registry.deregister(connection_id).await
        else {
            return;
        };

        if last_connection {
            info!("User {} went offline", user_id);
            self.router
                .dispatch(
                    &ServerEvent::PresenceChanged {
                        user_id,
                        status: PresenceStatus::Offline,
                    },
                    Target::Broadcast,
                )
                .await;
        }

        for room_id in self.rooms.leave_all(connection_id).await {
            self.router
                .dispatch(
                    &ServerEvent::MemberLeft {
                        room_id: room_id.clone(),
                        user_id,
                        username: username.to_string(),
                    },
                    Target::Room {
                        room_id,
                        exclude: None,
                    },
                )
                .await;
        }
    }
}

/// Ties connection cleanup to the lifetime of the connection task. The
/// task calls `complete` on its normal exit path; if the task unwinds
/// or is cancelled before that, `Drop` re-dispatches the cleanup on the
/// runtime so deregistration and room purging still happen.
pub struct DisconnectGuard {
    coordinator: Arc<PresenceCoordinator>,
    connection_id: Uuid,
    username: String,
    disarmed: bool,
}

impl DisconnectGuard {
    pub fn new(
        coordinator: Arc<PresenceCoordinator>,
        connection_id: Uuid,
        username: String,
    ) -> Self {
        Self {
            coordinator,
            connection_id,
            username,
            disarmed: false,
        }
    }

    pub async fn complete(mut self) {
        self.disarmed = true;
        self.coordinator
            .connection_closed(self.connection_id, &self.username)
            .await;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.disarmed {
            return;
        }
        warn!(
            "Connection {} task exited without cleanup, recovering",
            self.connection_id
        );
        let coordinator = self.coordinator.clone();
        let connection_id = self.connection_id;
        let username = std::mem::take(&mut self.username);
        tokio::spawn(async move {
            coordinator.connection_closed(connection_id, &username).await;
        });
    }
}
