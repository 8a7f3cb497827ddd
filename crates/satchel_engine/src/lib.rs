//! # Satchel Sync Engine
//!
//! Offline-first synchronization between a local store and a remote.
//!
//! This crate provides:
//! - An outbox-draining push engine (one delete and one upsert batch
//!   per collection, retry cap with poison-entry isolation)
//! - A watermarked pull engine (exclusive `updated_at` bound,
//!   last-write-wins application)
//! - First-run hydration of empty collections
//! - A coordinator that schedules push-then-pull cycles on a periodic
//!   interval, a startup kick, and on-demand events
//!
//! ## Architecture
//!
//! The engine implements a **push-then-pull** cycle:
//! 1. Drain local mutations from the outbox to the remote
//! 2. Pull remote changes newer than each collection's watermark
//! 3. Apply them over the local cache, last write wins
//!
//! Reads never wait for the network: the UI always reads the local
//! store, and sync catches it up in the background.
//!
//! ## Key Invariants
//!
//! - The push engine is the only writer of local changes to the remote
//! - Push always happens before pull within a cycle
//! - Watermarks are monotonic and advance only to observed timestamps
//! - A mutation is removed from the outbox only on remote confirmation
//!   or after exceeding the retry cap

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod config;
mod coordinator;
mod error;
mod hydrate;
mod pull;
mod push;
mod remote;
mod status;

pub use adapter::{CollectionAdapter, CollectionRegistry, TypedAdapter};
pub use config::EngineConfig;
pub use coordinator::{forward_remote_events, CycleReport, SyncCoordinator, SyncEvent};
pub use error::{SyncError, SyncResult};
pub use hydrate::Hydrator;
pub use pull::{PullEngine, PullReport};
pub use push::{DrainReport, PushEngine};
pub use remote::{MemoryRemote, RemoteStore};
pub use status::{StatusHandle, SyncStatus};
