//! Remote store abstraction.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use satchel_model::{ChangeEvent, CollectionName, OwnerId, Record, RecordId};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;

/// A remote store holds the authoritative copy of every collection.
///
/// This trait abstracts the backend, allowing for different
/// implementations (HTTP-backed, in-memory for testing, etc.). All
/// calls are blocking; the coordinator drives them from its own task.
pub trait RemoteStore: Send + Sync {
    /// Fetches an owner's records whose `updated_at` is strictly after `since`.
    fn fetch_since(
        &self,
        collection: &CollectionName,
        owner: OwnerId,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<Record>>;

    /// Fetches every live (non-deleted) record an owner has in a collection.
    fn fetch_all(&self, collection: &CollectionName, owner: OwnerId) -> SyncResult<Vec<Record>>;

    /// Writes a batch of records, overwriting matched ids.
    fn upsert(&self, collection: &CollectionName, records: &[Record]) -> SyncResult<()>;

    /// Deletes a batch of records by id.
    fn delete_many(&self, collection: &CollectionName, ids: &[RecordId]) -> SyncResult<()>;

    /// Returns true if the remote is currently reachable.
    fn is_online(&self) -> bool;

    /// Subscribes to remote change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// An in-memory remote for testing and demos.
///
/// Supports going offline, injecting transient failures, and
/// permanently rejecting specific record ids (a poison row).
pub struct MemoryRemote {
    tables: RwLock<BTreeMap<CollectionName, BTreeMap<RecordId, Record>>>,
    online: AtomicBool,
    fail_next_writes: Mutex<VecDeque<SyncError>>,
    rejected_ids: Mutex<HashSet<RecordId>>,
    upsert_calls: AtomicU64,
    delete_calls: AtomicU64,
    fetch_calls: AtomicU64,
    events: broadcast::Sender<ChangeEvent>,
}

impl MemoryRemote {
    /// Creates a new, empty, online remote.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            tables: RwLock::new(BTreeMap::new()),
            online: AtomicBool::new(true),
            fail_next_writes: Mutex::new(VecDeque::new()),
            rejected_ids: Mutex::new(HashSet::new()),
            upsert_calls: AtomicU64::new(0),
            delete_calls: AtomicU64::new(0),
            fetch_calls: AtomicU64::new(0),
            events,
        }
    }

    /// Sets the reachability of the remote.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Queues an error for the next write call (upsert or delete).
    ///
    /// Queued errors are consumed in order, one per call.
    pub fn fail_next_write(&self, error: SyncError) {
        self.fail_next_writes.lock().push_back(error);
    }

    /// Permanently rejects any upsert batch containing this id.
    pub fn reject_id(&self, id: RecordId) {
        self.rejected_ids.lock().insert(id);
    }

    /// Seeds records directly, bypassing failure injection.
    pub fn seed(&self, collection: &CollectionName, records: Vec<Record>) {
        let mut tables = self.tables.write();
        let table = tables.entry(collection.clone()).or_default();
        for record in records {
            table.insert(record.id, record);
        }
    }

    /// Returns a snapshot of a collection's records.
    pub fn records(&self, collection: &CollectionName) -> Vec<Record> {
        self.tables
            .read()
            .get(collection)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns a single record by id.
    pub fn record(&self, collection: &CollectionName, id: RecordId) -> Option<Record> {
        self.tables
            .read()
            .get(collection)
            .and_then(|t| t.get(&id))
            .cloned()
    }

    /// Broadcasts a change event to subscribers.
    pub fn emit(&self, event: ChangeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Number of upsert calls observed.
    pub fn upsert_calls(&self) -> u64 {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Number of delete calls observed.
    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Number of fetch calls observed.
    pub fn fetch_calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> SyncResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(SyncError::Offline)
        }
    }

    fn take_injected_failure(&self) -> Option<SyncError> {
        self.fail_next_writes.lock().pop_front()
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MemoryRemote {
    fn fetch_since(
        &self,
        collection: &CollectionName,
        owner: OwnerId,
        since: DateTime<Utc>,
    ) -> SyncResult<Vec<Record>> {
        self.check_reachable()?;
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tables
            .read()
            .get(collection)
            .map(|t| {
                t.values()
                    .filter(|r| r.owner == owner && r.updated_at > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_all(&self, collection: &CollectionName, owner: OwnerId) -> SyncResult<Vec<Record>> {
        self.check_reachable()?;
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tables
            .read()
            .get(collection)
            .map(|t| {
                t.values()
                    .filter(|r| r.owner == owner && !r.is_deleted())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn upsert(&self, collection: &CollectionName, records: &[Record]) -> SyncResult<()> {
        self.check_reachable()?;
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.take_injected_failure() {
            return Err(error);
        }
        {
            let rejected = self.rejected_ids.lock();
            if let Some(bad) = records.iter().find(|r| rejected.contains(&r.id)) {
                return Err(SyncError::rejected(
                    collection.clone(),
                    format!("row {} violates a constraint", bad.id),
                ));
            }
        }

        let mut tables = self.tables.write();
        let table = tables.entry(collection.clone()).or_default();
        for record in records {
            table.insert(record.id, record.clone());
        }
        drop(tables);

        self.emit(ChangeEvent::changed(collection.clone()));
        Ok(())
    }

    fn delete_many(&self, collection: &CollectionName, ids: &[RecordId]) -> SyncResult<()> {
        self.check_reachable()?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.take_injected_failure() {
            return Err(error);
        }

        let mut tables = self.tables.write();
        if let Some(table) = tables.get_mut(collection) {
            for id in ids {
                table.remove(id);
            }
        }
        drop(tables);

        self.emit(ChangeEvent::removed(collection.clone()));
        Ok(())
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}
