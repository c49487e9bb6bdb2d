use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use thescene_server::auth::AuthService;
use thescene_server::conversations::handlers::{
    conversations, mark_conversation_read, unread_count,
};
use thescene_server::db::{MessageStore, PgMessageStore};
use thescene_server::websocket::WebSocketServer;
use thescene_server::{health_check, AppError, AppState, Settings};

#[actix_web::main]
async fn main() -> thescene_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully");

    // Message store: messages must land here before any fan-out
    let store = PgMessageStore::new_with_options(
        &config.database.url,
        config.database.max_connections,
        Duration::from_secs(5),
    )
    .await?;
    store.run_migrations().await?;
    let store: Arc<dyn MessageStore> = Arc::new(store);

    let auth_service = Arc::new(AuthService::new(
        config.auth.jwt_secret.clone(),
        config.auth.token_expiry_hours,
    ));

    // Realtime websocket server on its own listener
    let ws_server = Arc::new(WebSocketServer::new(
        auth_service.clone(),
        store.clone(),
        config.websocket.clone(),
    ));
    let registry = ws_server.registry();
    let rooms = ws_server.rooms();

    let ws_addr = format!("{}:{}", config.server.host, config.server.ws_port);
    let ws_listener = TcpListener::bind(&ws_addr).await?;
    info!("WebSocket server ready at ws://{}", ws_addr);
    tokio::spawn(ws_server.serve(ws_listener));

    let state = web::Data::new(AppState {
        config: Arc::new(config.clone()),
        store,
        auth_service,
        registry,
        rooms,
    });

    let http_listener =
        std::net::TcpListener::bind(format!("{}:{}", config.server.host, config.server.http_port))?;
    info!(
        "HTTP server ready at http://{}:{}",
        config.server.host, config.server.http_port
    );

    let workers = config.server.workers as usize;
    let cors_settings = config.cors.clone();

    HttpServer::new(move || {
        let cors = if cors_settings.enabled {
            let cors_config = Cors::default();

            let cors_config = if cors_settings.allow_any_origin {
                cors_config
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
            } else {
                cors_config
                    .allowed_origin(&cors_settings.allowed_origin)
                    .allowed_methods(vec!["GET", "POST"])
                    .allowed_headers(vec!["Authorization", "Content-Type"])
                    .supports_credentials()
            };

            cors_config.max_age(cors_settings.max_age as usize)
        } else {
            Cors::default()
        };

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
            .route("/api/messages/conversations", web::get().to(conversations))
            .route("/api/messages/unread-count", web::get().to(unread_count))
            .route(
                "/api/messages/read/{counterparty_id}",
                web::post().to(mark_conversation_read),
            )
    })
    .listen(http_listener)?
    .workers(workers)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(())
}
