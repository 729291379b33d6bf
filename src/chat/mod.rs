//! Credit-metered chat with persisted per-user history.

pub mod handlers;
pub mod provider;
mod service;

pub use provider::{ChatProvider, EchoProvider};
pub use service::{ChatReply, ChatService};
