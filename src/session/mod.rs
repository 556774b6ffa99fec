//! Session lifecycle state machine
//!
//! [`SessionController`] owns the in-memory [`crate::SessionState`] and the
//! durable projection in the token store; [`RetryPolicy`] bounds the login
//! retry loop; [`focus`] turns external focus events into revalidation calls.

pub mod controller;
pub mod focus;
pub mod retry;

pub use controller::{LogoutReport, SessionController};
pub use retry::RetryPolicy;
