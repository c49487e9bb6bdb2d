use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::conversations::summarize_conversations;
use crate::error::AppError;
use crate::AppState;

fn identity(req: &HttpRequest, state: &AppState) -> Result<Uuid, AppError> {
    let header = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    state.auth_service.validate_bearer(header)?.user_id()
}

/// GET /api/messages/conversations: the caller's deduplicated
/// conversation list, most recent first.
pub async fn conversations(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = identity(&req, &state)?;

    let messages = state.store.fetch_all_messages_involving(user_id).await?;
    let summaries = summarize_conversations(user_id, &messages);

    Ok(HttpResponse::Ok().json(summaries))
}

/// GET /api/messages/unread-count
pub async fn unread_count(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = identity(&req, &state)?;

    let count = state.store.unread_count(user_id).await?;

    Ok(HttpResponse::Ok().json(json!({ "unreadCount": count })))
}

/// POST /api/messages/read/{counterpartyId}: flips everything the
/// counterparty sent the caller to read.
pub async fn mark_conversation_read(
    req: HttpRequest,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = identity(&req, &state)?;
    let counterparty_id = path.into_inner();

    let updated = state
        .store
        .mark_conversation_read(user_id, counterparty_id)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "updated": updated })))
}
