//! Outbound delivery of verification codes.
//!
//! Delivery goes through a webhook so the server never speaks SMTP
//! itself. The trait seam lets the auth service be tested with a mock.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::json;
use tracing::{error, info};
use url::Url;

use crate::error::{AppError, AuthError};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_otp(&self, email: &str, code: &str) -> Result<(), AppError>;
}

#[derive(Debug)]
pub struct HttpNotifier {
    client: reqwest::Client,
    webhook_url: Url,
}

impl HttpNotifier {
    pub fn new(webhook_url: &str, timeout_seconds: u64) -> Result<Self, AppError> {
        let webhook_url = Url::parse(webhook_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid webhook URL: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        Ok(Self { client, webhook_url })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_otp(&self, email: &str, code: &str) -> Result<(), AppError> {
        let payload = json!({
            "email": email,
            "code": code,
        });

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AuthError::DeliveryTimeout
                } else {
                    AuthError::VerificationSendFailed
                }
            })?;

        if !response.status().is_success() {
            error!("Verification webhook returned {}", response.status());
            return Err(AuthError::VerificationSendFailed.into());
        }

        // The code itself is never logged
        info!("Verification code dispatched to {}", email);
        Ok(())
    }
}
