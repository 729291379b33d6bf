//! Accounts and access control for the MapChat server.
//!
//! Registration with email verification, password login, bearer tokens
//! and the credit checks that gate AI usage.

pub mod handlers;
mod otp;
mod rate_limit;
mod service;

pub use rate_limit::{RateLimiter, RateLimitConfig};
pub use service::{AuthService, Claims};
