pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod notify;

use std::sync::Arc;
use actix_web::HttpResponse;

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use auth::{AuthService, RateLimiter, RateLimitConfig};
pub use chat::{ChatProvider, ChatService, EchoProvider};
pub use db::{Store, User};
pub use notify::{HttpNotifier, Notifier};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<Store>,
    pub auth_service: Arc<AuthService>,
    pub chat_service: Arc<ChatService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Settings) -> Result<Self> {
        let notifier = Arc::new(HttpNotifier::new(
            &config.notify.webhook_url,
            config.notify.timeout_seconds,
        )?);
        Self::with_components(config, notifier, Arc::new(EchoProvider))
    }

    /// Assembles the state around injected delivery and chat backends.
    pub fn with_components(
        config: Settings,
        notifier: Arc<dyn Notifier>,
        provider: Arc<dyn ChatProvider>,
    ) -> Result<Self> {
        if config.rate_limit.window_seconds == 0 {
            return Err(AppError::ConfigError(
                "rate_limit.window_seconds must be positive".to_string(),
            ));
        }
        if config.credits.chat_cost < 1 {
            return Err(AppError::ConfigError(
                "credits.chat_cost must be at least 1".to_string(),
            ));
        }
        if config.credits.signup_bonus < 0 {
            return Err(AppError::ConfigError(
                "credits.signup_bonus must not be negative".to_string(),
            ));
        }

        let store = Arc::new(Store::open(&config.store.snapshot_path));
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            max_requests: config.rate_limit.max_requests,
            window: chrono::Duration::seconds(config.rate_limit.window_seconds as i64),
        }));
        let auth_service = Arc::new(AuthService::new(store.clone(), notifier, &config));
        let chat_service = Arc::new(ChatService::new(
            store.clone(),
            auth_service.clone(),
            provider,
            rate_limiter.clone(),
            config.credits.chat_cost,
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            auth_service,
            chat_service,
            rate_limiter,
        })
    }
}
