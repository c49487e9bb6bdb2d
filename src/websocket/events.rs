use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::db::{ChatMessage, DirectMessage, FriendRequestRecord};

/// Everything a client may send over the socket. Decoded once, here;
/// the rest of the subsystem only ever sees typed variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientEvent {
    #[serde(rename = "auth")]
    Authenticate { token: String },
    #[serde(rename = "direct-message", rename_all = "camelCase")]
    DirectMessage {
        receiver_id: Uuid,
        content: String,
        #[serde(default)]
        image: Option<String>,
        #[serde(default)]
        video: Option<String>,
    },
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing { receiver_id: Uuid },
    #[serde(rename = "stop-typing", rename_all = "camelCase")]
    StopTyping { receiver_id: Uuid },
    #[serde(rename = "room-join", rename_all = "camelCase")]
    RoomJoin { room_id: String },
    #[serde(rename = "room-leave", rename_all = "camelCase")]
    RoomLeave { room_id: String },
    #[serde(rename = "room-message", rename_all = "camelCase")]
    RoomMessage {
        room_id: String,
        content: String,
        #[serde(default)]
        image: Option<String>,
        #[serde(default)]
        video: Option<String>,
    },
    #[serde(rename = "like-post", rename_all = "camelCase")]
    LikePost { post_id: Uuid },
    #[serde(rename = "new-comment", rename_all = "camelCase")]
    NewComment { post_id: Uuid, comment_id: Uuid },
    /// The friend request itself is created over the REST API; the socket
    /// event just asks us to ping the recipient with the stored record.
    #[serde(rename = "friend-request")]
    FriendRequest(FriendRequestRecord),
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Everything the server may push to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerEvent {
    #[serde(rename = "auth-result")]
    AuthResult {
        success: bool,
        error: Option<String>,
    },
    #[serde(rename = "presence-changed", rename_all = "camelCase")]
    PresenceChanged {
        user_id: Uuid,
        status: PresenceStatus,
    },
    #[serde(rename = "direct-message")]
    DirectMessage(DirectMessage),
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing { user_id: Uuid, username: String },
    #[serde(rename = "stop-typing", rename_all = "camelCase")]
    StopTyping { user_id: Uuid, username: String },
    #[serde(rename = "member-joined", rename_all = "camelCase")]
    MemberJoined {
        room_id: String,
        user_id: Uuid,
        username: String,
    },
    #[serde(rename = "member-left", rename_all = "camelCase")]
    MemberLeft {
        room_id: String,
        user_id: Uuid,
        username: String,
    },
    #[serde(rename = "room-message")]
    RoomMessage(ChatMessage),
    #[serde(rename = "friend-request-notify")]
    FriendRequestNotify(FriendRequestRecord),
    #[serde(rename = "post-liked", rename_all = "camelCase")]
    PostLiked {
        post_id: Uuid,
        user_id: Uuid,
        username: String,
    },
    #[serde(rename = "comment-added", rename_all = "camelCase")]
    CommentAdded {
        post_id: Uuid,
        comment_id: Uuid,
        user_id: Uuid,
        username: String,
    },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
}

impl ServerEvent {
    /// Serialize into a websocket text frame. Done once per dispatch,
    /// not once per recipient.
    pub fn to_frame(&self) -> Result<Message, serde_json::Error> {
        Ok(Message::Text(serde_json::to_string(self)?))
    }
}
