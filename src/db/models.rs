use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored direct message between two users. The record that comes back
/// from the store is what gets fanned out, so it carries everything a
/// client needs to render it without a second fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: i64,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub image: Option<String>,
    pub video: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDirectMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub image: Option<String>,
    pub video: Option<String>,
}

/// A stored chat-room message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub room_id: String,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub image: Option<String>,
    pub video: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub room_id: String,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub image: Option<String>,
    pub video: Option<String>,
}

/// Friend requests are created and stored by the main API service; the
/// realtime server only relays the record to the recipient, so there is
/// no `FromRow` here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestRecord {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub sender_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
