use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, decode, Header, EncodingKey, DecodingKey, Validation, Algorithm};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::auth::otp;
use crate::config::Settings;
use crate::db::models::{OtpRecord, Session, User, UserUpdate};
use crate::db::store::Store;
use crate::error::{AppError, AuthError, StoreError};
use crate::notify::Notifier;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
}

pub struct AuthService {
    store: Arc<Store>,
    notifier: Arc<dyn Notifier>,
    jwt_secret: String,
    token_expiry_hours: i64,
    otp_ttl_minutes: i64,
    signup_bonus: i64,
    daily_limit: u32,
}

impl AuthService {
    pub fn new(store: Arc<Store>, notifier: Arc<dyn Notifier>, settings: &Settings) -> Self {
        Self {
            store,
            notifier,
            jwt_secret: settings.auth.jwt_secret.clone(),
            token_expiry_hours: settings.auth.token_expiry_hours,
            otp_ttl_minutes: settings.auth.otp_ttl_minutes,
            signup_bonus: settings.credits.signup_bonus,
            daily_limit: settings.credits.daily_limit,
        }
    }

    /// Create the account and send a verification code. The account
    /// starts with zero credits; the signup bonus lands on verification.
    /// If the code cannot be delivered the account is rolled back so the
    /// address can register again.
    pub async fn register(
        &self,
        email: String,
        password: String,
        display_name: Option<String>,
    ) -> Result<User, AppError> {
        let email = email.trim().to_string();
        validate_registration(&email, &password)?;

        if self.store.find_user_by_email(&email).await.is_some() {
            return Err(StoreError::DuplicateEmail.into());
        }

        let password_hash = hash_password(password).await?;
        let user = self
            .store
            .create_user(email.clone(), password_hash, display_name)
            .await?;

        let code = otp::generate_code();
        self.store
            .put_otp(OtpRecord::new(email.clone(), code.clone(), self.otp_ttl_minutes))
            .await;

        if let Err(err) = self.notifier.send_otp(&email, &code).await {
            self.store.remove_otp(&email).await;
            if let Err(rollback_err) = self.store.delete_user(user.id).await {
                error!("Failed to roll back account after delivery failure: {}", rollback_err);
            }
            return Err(err);
        }

        Ok(user)
    }

    /// Redeem a verification code: grant the signup bonus, open a
    /// session and hand out the first token. Each code redeems at most
    /// once, so the bonus cannot be granted twice.
    pub async fn complete_registration(
        &self,
        email: &str,
        code: &str,
        user_agent: Option<String>,
    ) -> Result<(User, String), AppError> {
        if !self.store.mark_otp_verified(email, code).await {
            return Err(AuthError::InvalidOrExpiredCode.into());
        }

        let user = self
            .store
            .find_user_by_email(email)
            .await
            .ok_or(AuthError::UserNotFound)?;

        if self.signup_bonus > 0 {
            self.store
                .add_credits(user.id, self.signup_bonus, "signup_bonus")
                .await?;
        }

        let user = self
            .store
            .update_user(
                user.id,
                UserUpdate {
                    last_login_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        self.store
            .create_session(Session::new(user.id, user_agent))
            .await;
        let token = self.generate_token(&user.id.to_string())?;

        self.store.remove_otp(email).await;

        Ok((user, token))
    }

    /// Issue a fresh code for an address that registered but has not
    /// verified yet. The previous code stops working.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AppError> {
        let user = self
            .store
            .find_user_by_email(email)
            .await
            .ok_or(AuthError::UserNotFound)?;

        if self.store.otp_for_email(email).await.is_none() {
            return Err(AppError::ValidationError(
                "No pending verification for this account".to_string(),
            ));
        }

        let code = otp::generate_code();
        self.store
            .put_otp(OtpRecord::new(user.email.clone(), code.clone(), self.otp_ttl_minutes))
            .await;

        self.notifier.send_otp(&user.email, &code).await
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        user_agent: Option<String>,
    ) -> Result<(User, String), AppError> {
        let (user, stored_hash) = self
            .store
            .credentials_by_email(email)
            .await
            .ok_or(AuthError::UserNotFound)?;

        if !verify_password(stored_hash, password.to_string()).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        let user = self
            .store
            .update_user(
                user.id,
                UserUpdate {
                    last_login_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        self.store
            .create_session(Session::new(user.id, user_agent))
            .await;
        let token = self.generate_token(&user.id.to_string())?;

        Ok((user, token))
    }

    /// Validate a bearer token and resolve it to a live account. A token
    /// whose account has since been deleted is treated as invalid.
    pub async fn check_auth(&self, token: &str) -> Result<User, AppError> {
        let claims = self.decode_token(token)?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken)?;
        let user = self
            .store
            .get_user(user_id)
            .await
            .ok_or(AuthError::InvalidToken)?;

        self.store.touch_session(user.id).await;

        Ok(user)
    }

    /// Logout acknowledges a valid token. The token itself stays valid
    /// until it expires; clients drop it locally.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        self.check_auth(token).await?;
        Ok(())
    }

    /// Spend credits on one AI call. Returns false without touching
    /// anything when the balance does not cover the cost. The daily cap
    /// is an error, not a false, so callers can tell the cases apart.
    pub async fn use_ai_credits(&self, user_id: Uuid, cost: i64) -> Result<bool, AppError> {
        let user = self
            .store
            .get_user(user_id)
            .await
            .ok_or(StoreError::NotFound)?;
        if user.credits < cost {
            return Ok(false);
        }

        if self.store.daily_count(user_id).await >= self.daily_limit {
            return Err(AuthError::DailyLimitExceeded.into());
        }

        let debited = self.store.use_credits(user_id, cost, "ai_chat").await?;
        if debited.is_none() {
            return Ok(false);
        }

        self.store.record_ai_usage(user_id).await?;
        Ok(true)
    }

    fn generate_token(&self, user_id: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = (now + Duration::hours(self.token_expiry_hours)).timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            exp,
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }

    fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(claims.claims)
    }
}

fn validate_registration(email: &str, password: &str) -> Result<(), AppError> {
    if !valid_email(email) {
        return Err(AppError::ValidationError(
            "Invalid email address".to_string(),
        ));
    }
    if password.len() < 8 {
        return Err(AppError::ValidationError(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

// Argon2 work happens off the async runtime.
async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::InternalError(e.to_string()))
    })
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?
}

async fn verify_password(stored_hash: String, password: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?
}
