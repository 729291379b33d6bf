use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::models::{
    ChatMessage, DailyUsage, OtpRecord, Session, Transaction, TransactionKind, User, UserRecord,
    UserRole, UserUpdate,
};
use crate::db::snapshot::{self, Snapshot};
use crate::error::{AppError, AuthError, StoreError};

/// Messages retained per user; the oldest entry is evicted first.
pub const HISTORY_LIMIT: usize = 50;

struct StoreState {
    data: Snapshot,
    sessions: HashMap<Uuid, Session>,
    otps: HashMap<String, OtpRecord>,
}

/// Single authority for all account state. One lock guards the whole
/// state, so compound operations like check-then-debit are atomic.
/// Every mutation of persisted data is written through to the snapshot
/// before the lock is released.
pub struct Store {
    state: Mutex<StoreState>,
    snapshot_path: PathBuf,
}

impl Store {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let snapshot_path = path.into();
        let data = snapshot::load(&snapshot_path);
        Self {
            state: Mutex::new(StoreState {
                data,
                sessions: HashMap::new(),
                otps: HashMap::new(),
            }),
            snapshot_path,
        }
    }

    fn persist(&self, state: &StoreState) -> Result<(), AppError> {
        snapshot::write(&self.snapshot_path, &state.data)?;
        Ok(())
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub async fn create_user(
        &self,
        email: String,
        password_hash: String,
        display_name: Option<String>,
    ) -> Result<User, AppError> {
        let mut state = self.state.lock().await;

        let wanted = email.to_lowercase();
        if state
            .data
            .users
            .values()
            .any(|u| u.email.to_lowercase() == wanted)
        {
            return Err(StoreError::DuplicateEmail.into());
        }

        let record = UserRecord::new(email, password_hash, display_name);
        let user = record.sanitized();
        state.data.users.insert(record.id, record);
        self.persist(&state)?;

        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Option<User> {
        let state = self.state.lock().await;
        state.data.users.get(&id).map(UserRecord::sanitized)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Option<User> {
        let state = self.state.lock().await;
        let wanted = email.to_lowercase();
        state
            .data
            .users
            .values()
            .find(|u| u.email.to_lowercase() == wanted)
            .map(UserRecord::sanitized)
    }

    /// Lookup for password verification: the sanitized user plus the
    /// stored hash. The only path that exposes the hash to callers.
    pub async fn credentials_by_email(&self, email: &str) -> Option<(User, String)> {
        let state = self.state.lock().await;
        let wanted = email.to_lowercase();
        state
            .data
            .users
            .values()
            .find(|u| u.email.to_lowercase() == wanted)
            .map(|u| (u.sanitized(), u.password_hash.clone()))
    }

    pub async fn update_user(&self, id: Uuid, update: UserUpdate) -> Result<User, AppError> {
        let mut state = self.state.lock().await;

        let record = state
            .data
            .users
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        if let Some(display_name) = update.display_name {
            record.display_name = Some(display_name);
        }
        if let Some(last_login_at) = update.last_login_at {
            record.last_login_at = Some(last_login_at);
        }
        let user = record.sanitized();

        self.persist(&state)?;
        Ok(user)
    }

    /// Operational hook for seeding admin accounts.
    pub async fn set_role(&self, id: Uuid, role: UserRole) -> Result<User, AppError> {
        let mut state = self.state.lock().await;

        let record = state
            .data
            .users
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        record.role = role;
        let user = record.sanitized();

        self.persist(&state)?;
        Ok(user)
    }

    /// Remove an account and everything keyed to it.
    pub async fn delete_user(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().await;

        let record = state.data.users.remove(&id).ok_or(StoreError::NotFound)?;
        state.data.transactions.retain(|t| t.user_id != id);
        state.data.messages.remove(&id);
        state.data.daily_usage.remove(&id);
        state.sessions.remove(&id);
        state.otps.remove(&record.email.to_lowercase());

        self.persist(&state)?;
        Ok(())
    }

    pub async fn add_credits(
        &self,
        user_id: Uuid,
        amount: i64,
        description: &str,
    ) -> Result<Transaction, AppError> {
        if amount <= 0 {
            return Err(AppError::ValidationError(
                "Credit amount must be positive".to_string(),
            ));
        }

        let mut state = self.state.lock().await;

        let record = state
            .data
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound)?;
        record.credits += amount;
        let balance = record.credits;

        let transaction = Transaction::new(
            user_id,
            TransactionKind::Purchase,
            amount,
            balance,
            description.to_string(),
        );
        state.data.transactions.push(transaction.clone());

        self.persist(&state)?;
        Ok(transaction)
    }

    /// Debit `amount` if the balance covers it. Returns `Ok(None)` and
    /// changes nothing when it does not; the check and the debit happen
    /// under one lock so the balance can never go negative.
    pub async fn use_credits(
        &self,
        user_id: Uuid,
        amount: i64,
        description: &str,
    ) -> Result<Option<Transaction>, AppError> {
        if amount <= 0 {
            return Err(AppError::ValidationError(
                "Debit amount must be positive".to_string(),
            ));
        }

        let mut state = self.state.lock().await;

        let record = state
            .data
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound)?;
        if record.credits < amount {
            return Ok(None);
        }
        record.credits -= amount;
        let balance = record.credits;

        let transaction = Transaction::new(
            user_id,
            TransactionKind::Usage,
            amount,
            balance,
            description.to_string(),
        );
        state.data.transactions.push(transaction.clone());

        self.persist(&state)?;
        Ok(Some(transaction))
    }

    /// Transactions for one user, newest first.
    pub async fn transactions_for_user(&self, user_id: Uuid) -> Vec<Transaction> {
        let state = self.state.lock().await;
        state
            .data
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .rev()
            .cloned()
            .collect()
    }

    pub async fn save_message(&self, message: ChatMessage) -> Result<(), AppError> {
        let mut state = self.state.lock().await;

        let history = state.data.messages.entry(message.user_id).or_default();
        history.push_back(message);
        while history.len() > HISTORY_LIMIT {
            history.pop_front();
        }

        self.persist(&state)?;
        Ok(())
    }

    /// Chat history for one user, oldest first.
    pub async fn messages_for_user(&self, user_id: Uuid) -> Vec<ChatMessage> {
        let state = self.state.lock().await;
        state
            .data
            .messages
            .get(&user_id)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn clear_messages(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state.data.messages.remove(&user_id).is_none() {
            return Ok(());
        }
        self.persist(&state)?;
        Ok(())
    }

    /// One session per user: a new login replaces the old session.
    pub async fn create_session(&self, session: Session) {
        let mut state = self.state.lock().await;
        state.sessions.insert(session.user_id, session);
    }

    pub async fn touch_session(&self, user_id: Uuid) {
        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.get_mut(&user_id) {
            session.last_seen_at = Utc::now();
        }
    }

    pub async fn session_for_user(&self, user_id: Uuid) -> Option<Session> {
        let state = self.state.lock().await;
        state.sessions.get(&user_id).cloned()
    }

    /// Reissuing a code overwrites any pending one for the address.
    pub async fn put_otp(&self, record: OtpRecord) {
        let mut state = self.state.lock().await;
        state.otps.insert(record.email.to_lowercase(), record);
    }

    pub async fn otp_for_email(&self, email: &str) -> Option<OtpRecord> {
        let state = self.state.lock().await;
        state.otps.get(&email.to_lowercase()).cloned()
    }

    /// Flip a pending code to verified if it matches, is unexpired and
    /// has not been used before. Returns whether the flip happened, so
    /// a code can only ever verify once.
    pub async fn mark_otp_verified(&self, email: &str, code: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.otps.get_mut(&email.to_lowercase()) {
            Some(record) if !record.verified && !record.is_expired() && record.code == code => {
                record.verified = true;
                true
            }
            _ => false,
        }
    }

    pub async fn remove_otp(&self, email: &str) {
        let mut state = self.state.lock().await;
        state.otps.remove(&email.to_lowercase());
    }

    pub async fn purge_expired_otps(&self) -> usize {
        let mut state = self.state.lock().await;
        let before = state.otps.len();
        state.otps.retain(|_, record| !record.is_expired());
        before - state.otps.len()
    }

    /// AI calls recorded for the current UTC day.
    pub async fn daily_count(&self, user_id: Uuid) -> u32 {
        let state = self.state.lock().await;
        match state.data.daily_usage.get(&user_id) {
            Some(usage) if usage.day == Utc::now().date_naive() => usage.count,
            _ => 0,
        }
    }

    pub async fn record_ai_usage(&self, user_id: Uuid) -> Result<u32, AppError> {
        let mut state = self.state.lock().await;

        let today = Utc::now().date_naive();
        let usage = state
            .data
            .daily_usage
            .entry(user_id)
            .or_insert_with(DailyUsage::for_today);
        if usage.day != today {
            usage.day = today;
            usage.count = 0;
        }
        usage.count += 1;
        let count = usage.count;

        self.persist(&state)?;
        Ok(count)
    }

    /// Admin-only listing of every account.
    pub async fn all_users(&self, requester_id: Uuid) -> Result<Vec<User>, AppError> {
        let state = self.state.lock().await;

        let requester = state
            .data
            .users
            .get(&requester_id)
            .ok_or(AuthError::Unauthorized)?;
        if requester.role != UserRole::Admin {
            return Err(AuthError::Unauthorized.into());
        }

        let mut users: Vec<User> = state.data.users.values().map(UserRecord::sanitized).collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    pub async fn user_count(&self) -> usize {
        let state = self.state.lock().await;
        state.data.users.len()
    }
}
