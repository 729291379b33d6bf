use actix_web::{web, HttpResponse, HttpRequest};
use serde::{Deserialize, Serialize};
use crate::AppState;
use crate::db::models::User;
use crate::error::{AppError, AuthError};
use tracing::{info, error};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// Pulls the bearer token out of the Authorization header.
pub(crate) fn bearer_token(req: &HttpRequest) -> Result<&str, AppError> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AuthError::InvalidToken.into())
}

fn user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received registration request for email: {}", req.email);

    let RegisterRequest { email, password, display_name } = req.into_inner();
    match state
        .auth_service
        .register(email.clone(), password, display_name)
        .await
    {
        Ok(user) => {
            info!("Registration accepted for email: {}", user.email);
            Ok(HttpResponse::Accepted().json(serde_json::json!({
                "user": user,
                "message": "Verification code sent"
            })))
        }
        Err(e) => {
            error!("Registration failed for email: {}: {}", email, e);
            Err(e)
        }
    }
}

pub async fn verify(
    http_req: HttpRequest,
    req: web::Json<VerifyRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received verification request for email: {}", req.email);

    let VerifyRequest { email, code } = req.into_inner();
    match state
        .auth_service
        .complete_registration(&email, &code, user_agent(&http_req))
        .await
    {
        Ok((user, token)) => {
            info!("Verification successful for email: {}", email);
            Ok(HttpResponse::Ok().json(AuthResponse { user, token }))
        }
        Err(e) => {
            error!("Verification failed for email: {}: {}", email, e);
            Err(e)
        }
    }
}

pub async fn resend(
    req: web::Json<ResendRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received resend request for email: {}", req.email);

    match state.auth_service.resend_verification(&req.email).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Verification code sent"
        }))),
        Err(e) => {
            error!("Resend failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn login(
    http_req: HttpRequest,
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for email: {}", req.email);

    match state
        .auth_service
        .login(&req.email, &req.password, user_agent(&http_req))
        .await
    {
        Ok((user, token)) => {
            info!("Login successful for email: {}", req.email);
            Ok(HttpResponse::Ok().json(AuthResponse { user, token }))
        }
        Err(e) => {
            error!("Login failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    state.auth_service.logout(token).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Successfully logged out"
    })))
}

pub async fn me(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let user = state.auth_service.check_auth(token).await?;

    Ok(HttpResponse::Ok().json(user))
}
