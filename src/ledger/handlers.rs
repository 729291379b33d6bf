use actix_web::{web, HttpResponse, HttpRequest};
use serde::Deserialize;
use tracing::{info, error};
use uuid::Uuid;

use crate::auth::handlers::bearer_token;
use crate::db::models::UserRole;
use crate::error::{AppError, AuthError};
use crate::AppState;

pub async fn balance(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let user = state.auth_service.check_auth(token).await?;
    let daily_usage = state.store.daily_count(user.id).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "credits": user.credits,
        "daily_usage": daily_usage,
        "daily_limit": state.config.credits.daily_limit,
    })))
}

pub async fn history(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let user = state.auth_service.check_auth(token).await?;
    let transactions = state.store.transactions_for_user(user.id).await;

    Ok(HttpResponse::Ok().json(transactions))
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub user_id: Uuid,
    pub amount: i64,
    pub description: Option<String>,
}

pub async fn grant(
    req: HttpRequest,
    body: web::Json<GrantRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let requester = state.auth_service.check_auth(token).await?;
    if requester.role != UserRole::Admin {
        return Err(AuthError::Unauthorized.into());
    }

    let description = body
        .description
        .clone()
        .unwrap_or_else(|| "admin_grant".to_string());
    match state
        .store
        .add_credits(body.user_id, body.amount, &description)
        .await
    {
        Ok(transaction) => {
            info!(
                "Admin {} granted {} credits to {}",
                requester.id, body.amount, body.user_id
            );
            Ok(HttpResponse::Ok().json(transaction))
        }
        Err(e) => {
            error!("Credit grant to {} failed: {}", body.user_id, e);
            Err(e)
        }
    }
}

pub async fn list_users(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let requester = state.auth_service.check_auth(token).await?;
    let users = state.store.all_users(requester.id).await?;

    Ok(HttpResponse::Ok().json(users))
}
