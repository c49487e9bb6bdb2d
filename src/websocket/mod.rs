//! Realtime presence and event fan-out
//!
//! The only stateful part of the server: who is connected, which rooms
//! their connections are subscribed to, and how events find them. All
//! of it is in-memory and rebuilt from nothing on restart; clients
//! re-authenticate and re-announce presence when they reconnect.

pub mod connection;
pub mod events;
pub mod presence;
pub mod registry;
pub mod rooms;
pub mod router;
mod server;

pub use connection::Session;
pub use events::{ClientEvent, PresenceStatus, ServerEvent};
pub use presence::{DisconnectGuard, PresenceCoordinator};
pub use registry::{ConnectionRegistry, ConnectionSender, Deregistration};
pub use rooms::{RoomManager, RoomMember};
pub use router::{EventRouter, Target};
pub use server::WebSocketServer;
