//! Push engine: drains the outbox to the remote.

use crate::adapter::CollectionRegistry;
use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use satchel_model::{CollectionBatch, CollectionName, DrainPlan, OutboxEntry, Record, SyncAction};
use satchel_store::LocalStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Outbox entries confirmed by the remote and settled.
    pub settled: usize,
    /// Entries left in the outbox for a later attempt.
    pub deferred: usize,
    /// Seqs dropped because they exceeded the retry cap.
    pub dropped: Vec<u64>,
    /// True if another drain was already running and this one bowed out.
    pub skipped: bool,
}

impl DrainReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// True if every snapshotted entry was confirmed.
    pub fn is_clean(&self) -> bool {
        !self.skipped && self.deferred == 0 && self.dropped.is_empty()
    }
}

/// Drains pending local mutations to the remote store.
///
/// The push engine is the sole writer of local changes to the remote.
/// Each drain snapshots the outbox, plans one delete and one upsert
/// batch per collection, and settles entries only after the remote
/// confirms their batch. A batch failure defers (or, past the retry
/// cap, drops) only its own entries; other batches still run.
pub struct PushEngine {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    registry: Arc<CollectionRegistry>,
    config: EngineConfig,
    in_flight: AtomicBool,
}

impl PushEngine {
    /// Creates a push engine.
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        registry: Arc<CollectionRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            remote,
            registry,
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Queues a local mutation for the next drain.
    ///
    /// Enqueueing never fails the caller: the local write already
    /// happened, so a failure to journal the outbox entry is logged and
    /// the mutation is delivered on a later pass only if re-enqueued.
    pub fn enqueue(&self, collection: CollectionName, action: SyncAction, payload: Record) {
        match self
            .store
            .outbox_push(OutboxEntry::new(collection.clone(), action, payload))
        {
            Ok(seq) => tracing::trace!(%collection, seq, "queued local mutation"),
            Err(error) => {
                tracing::error!(%collection, %error, "failed to queue local mutation");
            }
        }
    }

    /// Drains the outbox once.
    ///
    /// Entries enqueued while a drain is in flight are not part of its
    /// snapshot; they wait for the next pass. Returns immediately with
    /// a skipped report if a drain is already running or the local
    /// store has been closed, and with [`SyncError::Offline`] (outbox
    /// untouched) when the remote is unreachable.
    pub fn drain(&self) -> SyncResult<DrainReport> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("drain already in flight, skipping");
            return Ok(DrainReport::skipped());
        }
        if !self.store.is_open() {
            self.in_flight.store(false, Ordering::SeqCst);
            tracing::debug!("local store is closed, skipping drain");
            return Ok(DrainReport::skipped());
        }
        let result = self.drain_locked();
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn drain_locked(&self) -> SyncResult<DrainReport> {
        let snapshot = self.store.outbox_snapshot()?;
        if snapshot.is_empty() {
            return Ok(DrainReport::default());
        }
        if !self.remote.is_online() {
            return Err(SyncError::Offline);
        }

        let plan = DrainPlan::build(&snapshot);
        let mut report = DrainReport::default();

        for batch in plan.batches() {
            let seqs = batch.seqs().to_vec();
            match self.push_batch(batch) {
                Ok(()) => {
                    self.store.outbox_settle(&seqs)?;
                    report.settled += seqs.len();
                }
                Err(error) => {
                    tracing::warn!(
                        collection = %batch.collection(),
                        entries = seqs.len(),
                        %error,
                        "push batch failed"
                    );
                    let dropped = self.store.outbox_retry(&seqs, self.config.max_retries)?;
                    report.deferred += seqs.len() - dropped.len();
                    report.dropped.extend(dropped);
                }
            }
        }

        tracing::debug!(
            settled = report.settled,
            deferred = report.deferred,
            dropped = report.dropped.len(),
            "drain complete"
        );
        Ok(report)
    }

    fn push_batch(&self, batch: &CollectionBatch) -> SyncResult<()> {
        match batch {
            CollectionBatch::Delete { collection, ids, .. } => {
                self.remote.delete_many(collection, ids)
            }
            CollectionBatch::Upsert {
                collection,
                records,
                ..
            } => {
                let outbound = records
                    .iter()
                    .map(|r| self.registry.outbound(collection, r))
                    .collect::<SyncResult<Vec<_>>>()?;
                self.remote.upsert(collection, &outbound)
            }
        }
    }
}
