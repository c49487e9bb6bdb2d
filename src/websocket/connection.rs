use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{MessageStore, NewChatMessage, NewDirectMessage};
use crate::error::{AppError, WebSocketError};
use crate::websocket::events::{ClientEvent, ServerEvent};
use crate::websocket::registry::ConnectionSender;
use crate::websocket::rooms::{RoomManager, RoomMember};
use crate::websocket::router::{EventRouter, Target};

/// One authenticated connection. Owns the identity resolved at the
/// handshake and turns inbound client events into store writes and
/// routed fan-outs.
pub struct Session {
    connection_id: Uuid,
    user_id: Uuid,
    username: String,
    tx: ConnectionSender,
    store: Arc<dyn MessageStore>,
    router: Arc<EventRouter>,
    rooms: Arc<RoomManager>,
    last_heartbeat: RwLock<Instant>,
}

impl Session {
    pub fn new(
        connection_id: Uuid,
        user_id: Uuid,
        username: String,
        tx: ConnectionSender,
        store: Arc<dyn MessageStore>,
        router: Arc<EventRouter>,
        rooms: Arc<RoomManager>,
    ) -> Self {
        Self {
            connection_id,
            user_id,
            username,
            tx,
            store,
            router,
            rooms,
            last_heartbeat: RwLock::new(Instant::now()),
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub async fn touch_heartbeat(&self) {
        *self.last_heartbeat.write().await = Instant::now();
    }

    pub async fn heartbeat_elapsed(&self) -> Duration {
        self.last_heartbeat.read().await.elapsed()
    }

    /// Process one websocket frame. Returns false when the connection
    /// should close. Domain errors never tear the connection down; the
    /// client just gets an `error` event back.
    pub async fn handle_frame(&self, msg: Message) -> bool {
        match msg {
            Message::Text(text) => {
                match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            warn!(
                                "Connection {} request failed: {}",
                                self.connection_id, e
                            );
                            let _ = self.send_event(ServerEvent::Error {
                                message: e.to_string(),
                            });
                        }
                    }
                    Err(e) => {
                        let _ = self.send_event(ServerEvent::Error {
                            message: format!("Invalid message format: {}", e),
                        });
                    }
                }
                true
            }
            Message::Close(_) => {
                info!("Client initiated close for connection {}", self.connection_id);
                false
            }
            Message::Ping(data) => {
                let _ = self.tx.send(Message::Pong(data));
                true
            }
            Message::Pong(_) => {
                self.touch_heartbeat().await;
                true
            }
            _ => {
                warn!(
                    "Unsupported message type on connection {}",
                    self.connection_id
                );
                true
            }
        }
    }

    async fn handle_event(&self, event: ClientEvent) -> Result<(), AppError> {
        match event {
            ClientEvent::Authenticate { .. } => Err(AppError::ValidationError(
                "Already authenticated".to_string(),
            )),
            ClientEvent::DirectMessage {
                receiver_id,
                content,
                image,
                video,
            } => {
                if receiver_id == self.user_id {
                    return Err(AppError::ValidationError(
                        "Cannot message yourself".to_string(),
                    ));
                }
                // Persist first: the fan-out payload is the stored record.
                let message = self
                    .store
                    .store_direct_message(NewDirectMessage {
                        sender_id: self.user_id,
                        receiver_id,
                        sender_name: self.username.clone(),
                        content,
                        image,
                        video,
                    })
                    .await?;
                self.router
                    .dispatch(&ServerEvent::DirectMessage(message), Target::User(receiver_id))
                    .await;
                Ok(())
            }
            ClientEvent::Typing { receiver_id } => {
                self.router
                    .dispatch(
                        &ServerEvent::Typing {
                            user_id: self.user_id,
                            username: self.username.clone(),
                        },
                        Target::User(receiver_id),
                    )
                    .await;
                Ok(())
            }
            ClientEvent::StopTyping { receiver_id } => {
                self.router
                    .dispatch(
                        &ServerEvent::StopTyping {
                            user_id: self.user_id,
                            username: self.username.clone(),
                        },
                        Target::User(receiver_id),
                    )
                    .await;
                Ok(())
            }
            ClientEvent::RoomJoin { room_id } => {
                let joined = self
                    .rooms
                    .join(
                        &room_id,
                        RoomMember {
                            connection_id: self.connection_id,
                            user_id: self.user_id,
                            username: self.username.clone(),
                            sender: self.tx.clone(),
                        },
                    )
                    .await;
                if joined {
                    self.router
                        .dispatch(
                            &ServerEvent::MemberJoined {
                                room_id: room_id.clone(),
                                user_id: self.user_id,
                                username: self.username.clone(),
                            },
                            Target::Room {
                                room_id,
                                exclude: None,
                            },
                        )
                        .await;
                }
                Ok(())
            }
            ClientEvent::RoomLeave { room_id } => {
                if self.rooms.leave(&room_id, self.connection_id).await.is_some() {
                    self.router
                        .dispatch(
                            &ServerEvent::MemberLeft {
                                room_id: room_id.clone(),
                                user_id: self.user_id,
                                username: self.username.clone(),
                            },
                            Target::Room {
                                room_id,
                                exclude: None,
                            },
                        )
                        .await;
                }
                Ok(())
            }
            ClientEvent::RoomMessage {
                room_id,
                content,
                image,
                video,
            } => {
                let message = self
                    .store
                    .store_room_message(NewChatMessage {
                        room_id: room_id.clone(),
                        sender_id: self.user_id,
                        sender_name: self.username.clone(),
                        content,
                        image,
                        video,
                    })
                    .await?;
                self.router
                    .dispatch(
                        &ServerEvent::RoomMessage(message),
                        Target::Room {
                            room_id,
                            exclude: None,
                        },
                    )
                    .await;
                Ok(())
            }
            ClientEvent::LikePost { post_id } => {
                self.router
                    .dispatch(
                        &ServerEvent::PostLiked {
                            post_id,
                            user_id: self.user_id,
                            username: self.username.clone(),
                        },
                        Target::Broadcast,
                    )
                    .await;
                Ok(())
            }
            ClientEvent::NewComment { post_id, comment_id } => {
                self.router
                    .dispatch(
                        &ServerEvent::CommentAdded {
                            post_id,
                            comment_id,
                            user_id: self.user_id,
                            username: self.username.clone(),
                        },
                        Target::Broadcast,
                    )
                    .await;
                Ok(())
            }
            ClientEvent::FriendRequest(record) => {
                let receiver_id = record.receiver_id;
                self.router
                    .dispatch(
                        &ServerEvent::FriendRequestNotify(record),
                        Target::User(receiver_id),
                    )
                    .await;
                Ok(())
            }
            ClientEvent::Ping => self.send_event(ServerEvent::Pong),
            ClientEvent::Pong => {
                self.touch_heartbeat().await;
                Ok(())
            }
        }
    }

    fn send_event(&self, event: ServerEvent) -> Result<(), AppError> {
        let frame = event
            .to_frame()
            .map_err(|e| WebSocketError::InvalidFormat(e.to_string()))?;
        self.tx
            .send(frame)
            .map_err(|e| WebSocketError::SendError(e.to_string()))?;
        Ok(())
    }
}
