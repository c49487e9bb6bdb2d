pub mod auth;
pub mod config;
pub mod conversations;
pub mod db;
pub mod error;
pub mod websocket;

use std::sync::Arc;
use actix_web::{web, HttpResponse};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::AuthService;
pub use db::{MessageStore, PgMessageStore};
pub use websocket::WebSocketServer;

/// Health check endpoint handler
/// Reports server status plus the live realtime footprint
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "connections": state.registry.connection_count().await,
        "rooms": state.rooms.room_count().await,
    }))
}

/// Application state shared across the HTTP handlers. The websocket
/// server holds its own references to the same registry and rooms, so
/// both surfaces observe one presence table.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<dyn MessageStore>,
    pub auth_service: Arc<AuthService>,
    pub registry: Arc<websocket::ConnectionRegistry>,
    pub rooms: Arc<websocket::RoomManager>,
}
