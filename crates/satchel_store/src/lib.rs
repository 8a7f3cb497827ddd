//! # Satchel Store
//!
//! Durable, transactional, client-side storage for the Satchel sync
//! engine.
//!
//! This crate provides:
//! - [`LocalStore`] — per-collection record tables, the outbox, and
//!   the watermark key-value area, all persisted through a single
//!   append-only JSON-lines journal
//! - Exclusive-access locking so a second context cannot corrupt the
//!   journal (it observes [`StoreError::Unavailable`] and retries)
//! - A blocked signal for the store being closed underneath its users
//!
//! The store survives process restarts and is fully usable offline;
//! it is the single source of truth the UI reads from.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod journal;
mod store;

pub use error::{StoreError, StoreResult};
pub use journal::JournalEntry;
pub use store::{BlockedSignal, LocalStore};
