//! Command implementations.

pub mod compact;
pub mod inspect;
pub mod outbox;
pub mod watermarks;
