use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};
use uuid::Uuid;

pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Outcome of removing a connection. `last_connection` is decided under
/// the same lock as the removal, so a user with several devices never
/// flickers offline when only one of them drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deregistration {
    pub user_id: Uuid,
    pub last_connection: bool,
}

#[derive(Debug, Default)]
struct RegistryIndex {
    /// user id -> live connections for that user
    by_user: HashMap<Uuid, HashMap<Uuid, ConnectionSender>>,
    /// connection id -> owning user id
    owner_of: HashMap<Uuid, Uuid>,
}

/// Source of truth for "is this user reachable right now". The single
/// most contended structure in the process; every operation takes the
/// one lock over both maps so they can never disagree.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    index: RwLock<RegistryIndex>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to the user's live set. Registering the same
    /// connection id twice is a no-op; a second *distinct* connection
    /// for the same user is additive.
    pub async fn register(&self, user_id: Uuid, connection_id: Uuid, sender: ConnectionSender) {
        let mut index = self.index.write().await;
        if index.owner_of.contains_key(&connection_id) {
            debug!("Connection {} already registered", connection_id);
            return;
        }
        index.owner_of.insert(connection_id, user_id);
        index
            .by_user
            .entry(user_id)
            .or_default()
            .insert(connection_id, sender);
        info!("Registered connection {} for user {}", connection_id, user_id);
    }

    /// Remove a connection from whichever user owns it. Idempotent:
    /// an unknown or already-removed handle returns `None`.
    pub async fn deregister(&self, connection_id: Uuid) -> Option<Deregistration> {
        let mut index = self.index.write().await;
        let user_id = index.owner_of.remove(&connection_id)?;

        let last_connection = match index.by_user.get_mut(&user_id) {
            Some(connections) => {
                connections.remove(&connection_id);
                if connections.is_empty() {
                    index.by_user.remove(&user_id);
                    true
                } else {
                    false
                }
            }
            None => true,
        };

        info!("Deregistered connection {} for user {}", connection_id, user_id);
        Some(Deregistration {
            user_id,
            last_connection,
        })
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.index
            .read()
            .await
            .by_user
            .get(&user_id)
            .map_or(false, |connections| !connections.is_empty())
    }

    /// Live senders for one user; empty if offline.
    pub async fn connections_for(&self, user_id: Uuid) -> Vec<ConnectionSender> {
        self.index
            .read()
            .await
            .by_user
            .get(&user_id)
            .map(|connections| connections.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every live sender across all users, for broadcast dispatch.
    pub async fn all_connections(&self) -> Vec<ConnectionSender> {
        self.index
            .read()
            .await
            .by_user
            .values()
            .flat_map(|connections| connections.values().cloned())
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.index.read().await.owner_of.len()
    }
}
