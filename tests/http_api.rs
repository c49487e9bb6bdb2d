mod common;

use std::sync::Arc;

use actix_web::{test, web, App};
use uuid::Uuid;

use common::{test_settings, InMemoryMessageStore, TestServer};
use thescene_server::auth::AuthService;
use thescene_server::conversations::handlers::{
    conversations, mark_conversation_read, unread_count,
};
use thescene_server::db::{MessageStore, NewDirectMessage};
use thescene_server::websocket::{ConnectionRegistry, RoomManager};
use thescene_server::{health_check, AppState};

fn app_state(store: Arc<InMemoryMessageStore>) -> (web::Data<AppState>, Arc<AuthService>) {
    let settings = test_settings();
    let auth_service = Arc::new(AuthService::new(
        settings.auth.jwt_secret.clone(),
        settings.auth.token_expiry_hours,
    ));
    let state = web::Data::new(AppState {
        config: Arc::new(settings),
        store,
        auth_service: auth_service.clone(),
        registry: Arc::new(ConnectionRegistry::new()),
        rooms: Arc::new(RoomManager::new()),
    });
    (state, auth_service)
}

async fn seed_message(
    store: &InMemoryMessageStore,
    sender: Uuid,
    receiver: Uuid,
    content: &str,
) -> i64 {
    store
        .store_direct_message(NewDirectMessage {
            sender_id: sender,
            receiver_id: receiver,
            sender_name: "seed".to_string(),
            content: content.to_string(),
            image: None,
            video: None,
        })
        .await
        .unwrap()
        .id
}

#[actix_web::test]
async fn test_health_check() {
    let (state, _auth) = app_state(Arc::new(InMemoryMessageStore::new()));

    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/health", web::get().to(health_check)),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["connections"], 0);
    assert_eq!(json["rooms"], 0);
    assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
}

#[actix_web::test]
async fn test_conversation_list_round_trip() {
    let store = Arc::new(InMemoryMessageStore::new());
    let me = Uuid::new_v4();
    let peer_one = Uuid::new_v4();
    let peer_two = Uuid::new_v4();

    seed_message(&store, me, peer_one, "first").await;
    seed_message(&store, peer_one, me, "latest from one").await;
    seed_message(&store, peer_two, me, "only from two").await;
    // Noise between strangers never shows up in my list.
    seed_message(&store, Uuid::new_v4(), Uuid::new_v4(), "noise").await;

    let (state, auth) = app_state(store);
    let token = auth.issue_token(me, "ada").unwrap();

    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/api/messages/conversations", web::get().to(conversations)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/messages/conversations")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let rows: serde_json::Value = test::read_body_json(resp).await;
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    // Most recent conversation first.
    assert_eq!(rows[0]["counterpartyId"], peer_two.to_string());
    assert_eq!(rows[0]["lastMessage"]["content"], "only from two");
    assert_eq!(rows[1]["counterpartyId"], peer_one.to_string());
    assert_eq!(rows[1]["lastMessage"]["content"], "latest from one");
}

#[actix_web::test]
async fn test_unread_count_and_mark_read() {
    let store = Arc::new(InMemoryMessageStore::new());
    let me = Uuid::new_v4();
    let peer = Uuid::new_v4();

    seed_message(&store, peer, me, "one").await;
    seed_message(&store, peer, me, "two").await;
    seed_message(&store, me, peer, "my own reply").await;

    let (state, auth) = app_state(store);
    let token = auth.issue_token(me, "ada").unwrap();

    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/api/messages/unread-count", web::get().to(unread_count))
            .route(
                "/api/messages/read/{counterparty_id}",
                web::post().to(mark_conversation_read),
            ),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/messages/unread-count")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["unreadCount"], 2);

    let req = test::TestRequest::post()
        .uri(&format!("/api/messages/read/{}", peer))
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["updated"], 2);

    let req = test::TestRequest::get()
        .uri("/api/messages/unread-count")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["unreadCount"], 0);
}

#[actix_web::test]
async fn test_routes_reject_missing_bearer() {
    let (state, _auth) = app_state(Arc::new(InMemoryMessageStore::new()));

    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/api/messages/conversations", web::get().to(conversations))
            .route("/api/messages/unread-count", web::get().to(unread_count)),
    )
    .await;

    for uri in ["/api/messages/conversations", "/api/messages/unread-count"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }
}

// The health endpoint reads the same registry the websocket server
// mutates; a live socket must show up in its connection count.
#[actix_web::test]
async fn test_health_reflects_live_connections() {
    let server = TestServer::spawn().await;
    let _client = common::TestClient::connect_as(&server, Uuid::new_v4(), "ada").await;

    let settings = test_settings();
    let auth_service = Arc::new(AuthService::new(
        settings.auth.jwt_secret.clone(),
        settings.auth.token_expiry_hours,
    ));
    let state = web::Data::new(AppState {
        config: Arc::new(settings),
        store: server.store.clone(),
        auth_service,
        registry: server.registry.clone(),
        rooms: server.rooms.clone(),
    });

    let app = test::init_service(
        App::new()
            .app_data(state)
            .route("/health", web::get().to(health_check)),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let json: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(json["connections"], 1);
}
