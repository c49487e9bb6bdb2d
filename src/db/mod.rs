//! Persistence boundary for TheScene realtime server
//!
//! The wider application owns posts, playlists and friend graphs; this
//! server only needs the message tables, behind the `MessageStore` seam
//! so the websocket layer never sees a concrete pool.

pub mod models;
pub mod operations;

pub use models::{ChatMessage, DirectMessage, FriendRequestRecord, NewChatMessage, NewDirectMessage};
pub use operations::{MessageStore, PgMessageStore};
