use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::db::models::ChatMessage;
use crate::error::AppError;

/// Produces the assistant side of a conversation. `history` is the
/// user's stored transcript, oldest first, with the new prompt already
/// appended.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn respond(&self, prompt: &str, history: &[ChatMessage]) -> Result<String, AppError>;
}

/// Offline provider that reflects the prompt back. Stands in wherever a
/// real model backend is not wired up.
pub struct EchoProvider;

#[async_trait]
impl ChatProvider for EchoProvider {
    async fn respond(&self, prompt: &str, _history: &[ChatMessage]) -> Result<String, AppError> {
        Ok(format!("You said: {}", prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_provider_reflects_prompt() {
        let provider = EchoProvider;
        let reply = provider.respond("where is the library", &[]).await.unwrap();
        assert_eq!(reply, "You said: where is the library");
    }
}
