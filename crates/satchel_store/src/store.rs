//! The local store: collection tables, outbox, and watermarks.

use crate::error::{StoreError, StoreResult};
use crate::journal::{replay, Journal, JournalEntry};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use satchel_model::{epoch_watermark, CollectionName, OutboxEntry, Record, RecordId, Watermark};
use std::collections::{BTreeMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

/// Signal that the store is closing underneath its users.
///
/// Subscribers treat the store as unavailable until it is reopened;
/// any in-flight operation fails fast with [`StoreError::Closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedSignal;

struct Inner {
    tables: BTreeMap<CollectionName, BTreeMap<RecordId, Record>>,
    outbox: VecDeque<OutboxEntry>,
    next_seq: u64,
    watermarks: BTreeMap<CollectionName, Watermark>,
    journal: Option<Journal>,
}

impl Inner {
    fn empty(journal: Option<Journal>) -> Self {
        Self {
            tables: BTreeMap::new(),
            outbox: VecDeque::new(),
            next_seq: 1,
            watermarks: BTreeMap::new(),
            journal,
        }
    }

    fn append(&mut self, entry: &JournalEntry) -> StoreResult<()> {
        if let Some(journal) = self.journal.as_mut() {
            journal.append(entry)?;
        }
        Ok(())
    }

    fn apply(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Put { collection, record } => {
                self.tables.entry(collection).or_default().insert(record.id, record);
            }
            JournalEntry::Delete { collection, id } => {
                if let Some(table) = self.tables.get_mut(&collection) {
                    table.remove(&id);
                }
            }
            JournalEntry::OutboxPush { entry } => {
                self.next_seq = self.next_seq.max(entry.seq + 1);
                self.outbox.push_back(entry);
            }
            JournalEntry::OutboxSettle { seqs } => {
                self.outbox.retain(|e| !seqs.contains(&e.seq));
            }
            JournalEntry::OutboxRetry { seqs, max_retries } => {
                apply_retry(&mut self.outbox, &seqs, max_retries);
            }
            JournalEntry::Watermark { collection, at } => {
                let current = self.watermarks.entry(collection).or_insert_with(epoch_watermark);
                if at > *current {
                    *current = at;
                }
            }
        }
    }
}

/// Increments retries for the given seqs and removes entries past the
/// cap. Returns the seqs that were dropped.
fn apply_retry(outbox: &mut VecDeque<OutboxEntry>, seqs: &[u64], max_retries: u32) -> Vec<u64> {
    let mut dropped = Vec::new();
    outbox.retain_mut(|entry| {
        if !seqs.contains(&entry.seq) {
            return true;
        }
        entry.retries += 1;
        if entry.exhausted(max_retries) {
            dropped.push(entry.seq);
            false
        } else {
            true
        }
    });
    dropped
}

/// Durable client-side store for synchronized collections.
///
/// The store holds a cached copy of each synchronized collection, the
/// outbox of pending mutations, and the per-collection pull
/// watermarks. All state is persisted through a single append-only
/// journal and replayed on open, so it survives restarts and is fully
/// usable offline.
///
/// # Exclusive access
///
/// A file-backed store takes an exclusive lock; a second context
/// opening the same path observes [`StoreError::Unavailable`] and
/// retries with a fixed delay. The design tolerates the store closing
/// and reopening at arbitrary times — callers re-check [`is_open`]
/// before each operation batch and subscribe to the blocked signal.
///
/// [`is_open`]: LocalStore::is_open
pub struct LocalStore {
    inner: RwLock<Inner>,
    open: AtomicBool,
    blocked: Mutex<Vec<Sender<BlockedSignal>>>,
    // Held for the lifetime of the store; the OS releases it on drop.
    _lock: Option<File>,
}

impl LocalStore {
    /// Opens a file-backed store, replaying its journal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if another context holds
    /// the lock, and [`StoreError::Journal`] on non-tail corruption.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::unavailable(path.display().to_string()));
        }

        let entries = replay(path)?;
        let replayed = entries.len();
        let mut journal = Journal::open(path)?;
        journal.note_replayed(replayed);

        let mut inner = Inner::empty(Some(journal));
        for entry in entries {
            inner.apply(entry);
        }

        tracing::debug!(path = %path.display(), entries = replayed, "opened local store");

        Ok(Self {
            inner: RwLock::new(inner),
            open: AtomicBool::new(true),
            blocked: Mutex::new(Vec::new()),
            _lock: Some(lock_file),
        })
    }

    /// Opens a file-backed store, retrying on lock contention.
    ///
    /// Observed policy from the source: retry after a fixed 3 s delay.
    pub fn open_with_retry(
        path: impl AsRef<Path>,
        delay: Duration,
        attempts: u32,
    ) -> StoreResult<Self> {
        let path = path.as_ref();
        let mut last = None;
        for attempt in 0..attempts.max(1) {
            if attempt > 0 {
                std::thread::sleep(delay);
            }
            match Self::open(path) {
                Ok(store) => return Ok(store),
                Err(e @ StoreError::Unavailable { .. }) => {
                    tracing::warn!(attempt = attempt + 1, "store locked, will retry");
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or_else(|| StoreError::unavailable(path.display().to_string())))
    }

    /// Opens an ephemeral in-memory store (no journal, no lock).
    #[must_use]
    pub fn open_in_memory() -> Self {
        Self {
            inner: RwLock::new(Inner::empty(None)),
            open: AtomicBool::new(true),
            blocked: Mutex::new(Vec::new()),
            _lock: None,
        }
    }

    /// Returns true while the store accepts operations.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Closes the store and notifies blocked-signal subscribers.
    ///
    /// All subsequent operations fail with [`StoreError::Closed`].
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let mut subscribers = self.blocked.lock();
            subscribers.retain(|tx| tx.send(BlockedSignal).is_ok());
        }
    }

    /// Subscribes to the blocked signal.
    pub fn subscribe_blocked(&self) -> Receiver<BlockedSignal> {
        let (tx, rx) = mpsc::channel();
        self.blocked.lock().push(tx);
        rx
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StoreError::Closed)
        }
    }

    /// Gets a record by id.
    pub fn get(&self, collection: &CollectionName, id: RecordId) -> StoreResult<Option<Record>> {
        self.check_open()?;
        let inner = self.inner.read();
        Ok(inner
            .tables
            .get(collection)
            .and_then(|table| table.get(&id))
            .cloned())
    }

    /// Writes a record, journaling before the table mutates.
    pub fn put(&self, collection: &CollectionName, record: Record) -> StoreResult<()> {
        self.check_open()?;
        let mut inner = self.inner.write();
        let entry = JournalEntry::Put {
            collection: collection.clone(),
            record,
        };
        inner.append(&entry)?;
        inner.apply(entry);
        Ok(())
    }

    /// Writes a batch of records under one lock acquisition.
    ///
    /// Used by the pull engine and hydrator; matched ids are
    /// unconditionally overwritten (last-write-wins).
    pub fn bulk_put(&self, collection: &CollectionName, records: Vec<Record>) -> StoreResult<()> {
        self.check_open()?;
        let mut inner = self.inner.write();
        for record in records {
            let entry = JournalEntry::Put {
                collection: collection.clone(),
                record,
            };
            inner.append(&entry)?;
            inner.apply(entry);
        }
        Ok(())
    }

    /// Physically removes a record from a table.
    ///
    /// Soft delete is a policy of the engine layer; the store itself
    /// removes rows (e.g. when compacting remotely-confirmed deletes).
    pub fn delete(&self, collection: &CollectionName, id: RecordId) -> StoreResult<()> {
        self.check_open()?;
        let mut inner = self.inner.write();
        let entry = JournalEntry::Delete {
            collection: collection.clone(),
            id,
        };
        inner.append(&entry)?;
        inner.apply(entry);
        Ok(())
    }

    /// Returns the number of records cached for a collection.
    pub fn count(&self, collection: &CollectionName) -> StoreResult<usize> {
        self.check_open()?;
        let inner = self.inner.read();
        Ok(inner.tables.get(collection).map_or(0, BTreeMap::len))
    }

    /// Returns records matching a predicate.
    pub fn query<F>(&self, collection: &CollectionName, predicate: F) -> StoreResult<Vec<Record>>
    where
        F: Fn(&Record) -> bool,
    {
        self.check_open()?;
        let inner = self.inner.read();
        Ok(inner
            .tables
            .get(collection)
            .map(|table| table.values().filter(|r| predicate(r)).cloned().collect())
            .unwrap_or_default())
    }

    /// Owner-scoped, non-deleted records, newest first.
    ///
    /// This is the read shape the UI uses everywhere.
    pub fn active(
        &self,
        collection: &CollectionName,
        owner: satchel_model::OwnerId,
    ) -> StoreResult<Vec<Record>> {
        let mut records = self.query(collection, |r| r.owner == owner && !r.is_deleted())?;
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    /// Returns the names of all collections with cached records.
    pub fn collections(&self) -> StoreResult<Vec<CollectionName>> {
        self.check_open()?;
        let inner = self.inner.read();
        Ok(inner.tables.keys().cloned().collect())
    }

    /// Appends an entry to the outbox, assigning its seq.
    pub fn outbox_push(&self, mut entry: OutboxEntry) -> StoreResult<u64> {
        self.check_open()?;
        let mut inner = self.inner.write();
        entry.seq = inner.next_seq;
        let seq = entry.seq;
        let journal_entry = JournalEntry::OutboxPush { entry };
        inner.append(&journal_entry)?;
        inner.apply(journal_entry);
        Ok(seq)
    }

    /// Snapshots the outbox in enqueue order.
    ///
    /// Entries enqueued after the snapshot belong to the next drain.
    pub fn outbox_snapshot(&self) -> StoreResult<Vec<OutboxEntry>> {
        self.check_open()?;
        let inner = self.inner.read();
        Ok(inner.outbox.iter().cloned().collect())
    }

    /// Returns the number of pending outbox entries.
    pub fn outbox_len(&self) -> StoreResult<usize> {
        self.check_open()?;
        Ok(self.inner.read().outbox.len())
    }

    /// Removes successfully pushed entries.
    pub fn outbox_settle(&self, seqs: &[u64]) -> StoreResult<()> {
        if seqs.is_empty() {
            return Ok(());
        }
        self.check_open()?;
        let mut inner = self.inner.write();
        let entry = JournalEntry::OutboxSettle {
            seqs: seqs.to_vec(),
        };
        inner.append(&entry)?;
        inner.apply(entry);
        Ok(())
    }

    /// Records a failed push attempt for the given entries.
    ///
    /// Increments each entry's retry count and drops entries whose
    /// count exceeds `max_retries`. Returns the dropped seqs — a
    /// dropped entry is permanent data loss for that one mutation,
    /// accepted so a poison entry cannot block the queue.
    pub fn outbox_retry(&self, seqs: &[u64], max_retries: u32) -> StoreResult<Vec<u64>> {
        if seqs.is_empty() {
            return Ok(Vec::new());
        }
        self.check_open()?;
        let mut inner = self.inner.write();
        let entry = JournalEntry::OutboxRetry {
            seqs: seqs.to_vec(),
            max_retries,
        };
        inner.append(&entry)?;
        let dropped = apply_retry(&mut inner.outbox, seqs, max_retries);
        if !dropped.is_empty() {
            tracing::warn!(?dropped, "dropping outbox entries past the retry cap");
        }
        Ok(dropped)
    }

    /// Returns the watermark for a collection (epoch if never pulled).
    pub fn watermark(&self, collection: &CollectionName) -> StoreResult<Watermark> {
        self.check_open()?;
        let inner = self.inner.read();
        Ok(inner
            .watermarks
            .get(collection)
            .copied()
            .unwrap_or_else(epoch_watermark))
    }

    /// Advances a collection's watermark.
    ///
    /// Watermarks are monotonic: an `at` at or below the current value
    /// is a no-op and is not journaled.
    pub fn advance_watermark(
        &self,
        collection: &CollectionName,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.check_open()?;
        let mut inner = self.inner.write();
        let current = inner
            .watermarks
            .get(collection)
            .copied()
            .unwrap_or_else(epoch_watermark);
        if at <= current {
            return Ok(());
        }
        let entry = JournalEntry::Watermark {
            collection: collection.clone(),
            at,
        };
        inner.append(&entry)?;
        inner.apply(entry);
        Ok(())
    }

    /// Rewrites the journal from live state, discarding dead entries.
    ///
    /// Returns the number of entries in the compacted journal.
    pub fn compact(&self) -> StoreResult<usize> {
        self.check_open()?;
        let mut inner = self.inner.write();

        let mut entries = Vec::new();
        for (collection, table) in &inner.tables {
            for record in table.values() {
                entries.push(JournalEntry::Put {
                    collection: collection.clone(),
                    record: record.clone(),
                });
            }
        }
        for entry in &inner.outbox {
            entries.push(JournalEntry::OutboxPush {
                entry: entry.clone(),
            });
        }
        for (collection, at) in &inner.watermarks {
            entries.push(JournalEntry::Watermark {
                collection: collection.clone(),
                at: *at,
            });
        }

        let count = entries.len();
        if let Some(journal) = inner.journal.as_mut() {
            journal.rewrite(&entries)?;
        }
        tracing::debug!(entries = count, "compacted journal");
        Ok(count)
    }

    /// Returns the number of journal entries written so far.
    ///
    /// In-memory stores report zero.
    pub fn journal_len(&self) -> StoreResult<usize> {
        self.check_open()?;
        Ok(self.inner.read().journal.as_ref().map_or(0, Journal::entries))
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
