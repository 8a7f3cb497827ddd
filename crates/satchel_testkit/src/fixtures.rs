//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test data.

use chrono::{DateTime, Duration, Utc};
use satchel_model::{CollectionName, OutboxEntry, OwnerId, Record, SyncAction};
use satchel_store::LocalStore;
use std::path::PathBuf;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: LocalStore,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        Self {
            store: LocalStore::open_in_memory(),
            _temp_dir: None,
        }
    }

    /// Creates a new file-backed test store.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("satchel.journal");
        let store = LocalStore::open(&path).expect("Failed to open file store");
        Self {
            store,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the journal path if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir
            .as_ref()
            .map(|d| d.path().join("satchel.journal"))
    }
}

impl std::ops::Deref for TestStore {
    type Target = LocalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&LocalStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a temporary file-backed store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&LocalStore, &std::path::Path) -> R,
{
    let test_store = TestStore::file();
    let path = test_store.path().expect("File store should have a path");
    f(&test_store.store, &path)
}

/// A well-known collection name for tests.
pub fn test_collection() -> CollectionName {
    CollectionName::new("tasks").expect("valid collection name")
}

/// Builds a record with a single `title` field.
pub fn titled_record(owner: OwnerId, title: &str) -> Record {
    let mut fields = serde_json::Map::new();
    fields.insert("title".into(), serde_json::json!(title));
    Record::new(owner, fields)
}

/// Builds a record whose `updated_at` lies in the past.
pub fn aged_record(owner: OwnerId, title: &str, age: Duration) -> Record {
    let mut record = titled_record(owner, title);
    let then = Utc::now() - age;
    record.created_at = then;
    record.updated_at = then;
    record
}

/// Builds a pending insert for the outbox.
pub fn pending_insert(collection: CollectionName, owner: OwnerId, title: &str) -> OutboxEntry {
    OutboxEntry::new(collection, SyncAction::Insert, titled_record(owner, title))
}

/// Builds a pending delete (tombstone payload) for the outbox.
pub fn pending_delete(collection: CollectionName, record: &Record, at: DateTime<Utc>) -> OutboxEntry {
    OutboxEntry::new(collection, SyncAction::Delete, record.tombstone(at))
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a store pre-populated with active records for one owner.
    pub fn populated_store(record_count: usize) -> (TestStore, OwnerId) {
        let test_store = TestStore::memory();
        let owner = OwnerId::new();
        let collection = test_collection();

        for i in 0..record_count {
            let record = aged_record(owner, &format!("task {i}"), Duration::minutes(i as i64));
            test_store
                .put(&collection, record)
                .expect("Failed to put record");
        }

        (test_store, owner)
    }

    /// Creates a store with a backlog of pending outbox entries.
    pub fn backlogged_store(entry_count: usize) -> (TestStore, OwnerId, Vec<u64>) {
        let test_store = TestStore::memory();
        let owner = OwnerId::new();
        let collection = test_collection();
        let mut seqs = Vec::with_capacity(entry_count);

        for i in 0..entry_count {
            let entry = pending_insert(collection.clone(), owner, &format!("pending {i}"));
            let seq = test_store
                .outbox_push(entry)
                .expect("Failed to push outbox entry");
            seqs.push(seq);
        }

        (test_store, owner, seqs)
    }
}
