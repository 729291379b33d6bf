//! Persistent state for the MapChat server.
//!
//! A single in-memory store backed by a JSON snapshot on disk. Accounts,
//! the credit ledger, chat history and daily usage survive restarts;
//! sessions and pending verification codes do not.

pub mod models;
pub mod snapshot;
pub mod store;

pub use models::{ChatMessage, Session, Transaction, User, UserRecord};
pub use store::Store;
