use actix_web::{web, HttpResponse, HttpRequest};
use serde::Deserialize;
use tracing::{info, error};

use crate::auth::handlers::bearer_token;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

pub async fn send(
    req: HttpRequest,
    body: web::Json<ChatRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let user = state.auth_service.check_auth(token).await?;

    match state
        .chat_service
        .send_message(user.id, body.into_inner().message)
        .await
    {
        Ok(Some(reply)) => Ok(HttpResponse::Ok().json(reply)),
        Ok(None) => Ok(HttpResponse::PaymentRequired().json(serde_json::json!({
            "error": {
                "status": 402,
                "message": "Insufficient credits"
            }
        }))),
        Err(e) => {
            error!("Chat request failed for {}: {}", user.id, e);
            Err(e)
        }
    }
}

pub async fn history(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let user = state.auth_service.check_auth(token).await?;
    let messages = state.store.messages_for_user(user.id).await;

    Ok(HttpResponse::Ok().json(messages))
}

pub async fn clear_history(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let user = state.auth_service.check_auth(token).await?;
    state.store.clear_messages(user.id).await?;
    info!("Cleared chat history for {}", user.id);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Chat history cleared"
    })))
}
