//! # Satchel Model
//!
//! Data model for the Satchel sync engine.
//!
//! This crate provides:
//! - `Record` and its identifier newtypes
//! - `OutboxEntry` for pending local mutations
//! - `DrainPlan` for per-collection push batching
//! - `ChangeEvent` for realtime notifications
//! - Watermark types and key layout
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod event;
mod outbox;
mod plan;
mod record;
mod watermark;

pub use event::{ChangeEvent, ChangeKind};
pub use outbox::{OutboxEntry, SyncAction};
pub use plan::{CollectionBatch, DrainPlan};
pub use record::{
    strip_derived, CollectionName, ModelError, OwnerId, Record, RecordDocument, RecordId,
};
pub use watermark::{epoch_watermark, watermark_key, Watermark};
