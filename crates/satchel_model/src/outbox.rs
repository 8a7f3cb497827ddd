//! Outbox entries: the ordered log of pending local mutations.

use crate::record::{CollectionName, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of local mutation awaiting remote application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    /// Record was created locally.
    Insert,
    /// Record was modified locally.
    Update,
    /// Record was soft-deleted locally.
    Delete,
}

impl SyncAction {
    /// Returns true for actions that push the full record upstream.
    ///
    /// Inserts and updates are both sent as upserts; deletes are sent
    /// as an id-set removal.
    #[must_use]
    pub fn is_upsert(&self) -> bool {
        matches!(self, SyncAction::Insert | SyncAction::Update)
    }
}

/// One pending mutation in the outbox.
///
/// Entries are created synchronously with every local mutation and are
/// exclusively owned by the push engine afterwards: settled on success,
/// retried on failure, and dropped once `retries` exceeds the cap so a
/// poison entry can never block the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Store-assigned monotonic sequence number.
    pub seq: u64,
    /// Target collection.
    pub collection: CollectionName,
    /// What happened locally.
    pub action: SyncAction,
    /// The record, or an id-plus-tombstone payload for deletes.
    pub payload: Record,
    /// When the mutation was enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// Number of failed push attempts so far.
    pub retries: u32,
}

impl OutboxEntry {
    /// Creates a new entry with zero retries.
    ///
    /// The sequence number is assigned by the local store on append;
    /// callers pass zero.
    #[must_use]
    pub fn new(collection: CollectionName, action: SyncAction, payload: Record) -> Self {
        Self {
            seq: 0,
            collection,
            action,
            payload,
            enqueued_at: Utc::now(),
            retries: 0,
        }
    }

    /// Returns true once the entry has exceeded the retry cap.
    #[must_use]
    pub fn exhausted(&self, max_retries: u32) -> bool {
        self.retries > max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::OwnerId;

    fn entry(action: SyncAction) -> OutboxEntry {
        OutboxEntry::new(
            CollectionName::new("tasks").unwrap(),
            action,
            Record::new(OwnerId::new(), serde_json::Map::new()),
        )
    }

    #[test]
    fn upsert_classification() {
        assert!(SyncAction::Insert.is_upsert());
        assert!(SyncAction::Update.is_upsert());
        assert!(!SyncAction::Delete.is_upsert());
    }

    #[test]
    fn fresh_entry_has_zero_retries() {
        let e = entry(SyncAction::Insert);
        assert_eq!(e.seq, 0);
        assert_eq!(e.retries, 0);
        assert!(!e.exhausted(3));
    }

    #[test]
    fn exhaustion_is_strictly_past_the_cap() {
        let mut e = entry(SyncAction::Update);
        e.retries = 3;
        assert!(!e.exhausted(3));
        e.retries = 4;
        assert!(e.exhausted(3));
    }

    #[test]
    fn entry_serde_roundtrip() {
        let e = entry(SyncAction::Delete);
        let json = serde_json::to_string(&e).unwrap();
        let back: OutboxEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }
}
