//! Credit balance and history endpoints, plus admin grants.
//!
//! The balance itself lives on the user record and every change goes
//! through the store's transaction log; these handlers only expose it.

pub mod handlers;
