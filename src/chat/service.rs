use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{AuthService, RateLimiter};
use crate::chat::provider::ChatProvider;
use crate::db::models::{ChatMessage, MessageRole};
use crate::db::store::Store;
use crate::error::{AppError, AuthError, StoreError};

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub message: ChatMessage,
    pub credits: i64,
}

pub struct ChatService {
    store: Arc<Store>,
    auth: Arc<AuthService>,
    provider: Arc<dyn ChatProvider>,
    limiter: Arc<RateLimiter>,
    chat_cost: i64,
}

impl ChatService {
    pub fn new(
        store: Arc<Store>,
        auth: Arc<AuthService>,
        provider: Arc<dyn ChatProvider>,
        limiter: Arc<RateLimiter>,
        chat_cost: i64,
    ) -> Self {
        Self {
            store,
            auth,
            provider,
            limiter,
            chat_cost,
        }
    }

    /// One paid round trip. The rate limit is checked before any credit
    /// moves, so a throttled request costs nothing. Returns `Ok(None)`
    /// when the balance does not cover the call; nothing is persisted in
    /// that case either.
    pub async fn send_message(
        &self,
        user_id: Uuid,
        content: String,
    ) -> Result<Option<ChatReply>, AppError> {
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::ValidationError(
                "Message must not be empty".to_string(),
            ));
        }

        if !self.limiter.check_rate_limit(user_id).await {
            return Err(AuthError::RateLimited.into());
        }

        if !self.auth.use_ai_credits(user_id, self.chat_cost).await? {
            info!("Chat declined for {}: insufficient credits", user_id);
            return Ok(None);
        }

        self.store
            .save_message(ChatMessage::new(user_id, MessageRole::User, content.clone()))
            .await?;
        let history = self.store.messages_for_user(user_id).await;

        let reply_text = self.provider.respond(&content, &history).await?;
        let reply = ChatMessage::new(user_id, MessageRole::Assistant, reply_text);
        self.store.save_message(reply.clone()).await?;

        let credits = self
            .store
            .get_user(user_id)
            .await
            .ok_or(StoreError::NotFound)?
            .credits;

        Ok(Some(ChatReply {
            message: reply,
            credits,
        }))
    }
}
