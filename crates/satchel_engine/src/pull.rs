//! Pull engine: applies remote changes since each collection's
//! watermark.

use crate::adapter::CollectionRegistry;
use crate::error::SyncResult;
use crate::remote::RemoteStore;
use satchel_model::{strip_derived, CollectionName, OwnerId};
use satchel_store::LocalStore;
use std::sync::Arc;

/// Outcome of pulling one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    /// Records fetched and applied.
    pub applied: usize,
    /// Records skipped because they failed the adapter's decode check.
    pub skipped: usize,
}

/// Pulls remote changes into the local store.
///
/// Each pull asks the remote for records updated strictly after the
/// collection's watermark, applies them over the local rows
/// (last-write-wins, the fetched row replaces the cached one), and
/// advances the watermark to the newest `updated_at` observed. The
/// watermark never moves to wall-clock time, so a fetch that races a
/// remote write cannot skip past it.
pub struct PullEngine {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    registry: Arc<CollectionRegistry>,
    owner: OwnerId,
}

impl PullEngine {
    /// Creates a pull engine scoped to one owner's data.
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        registry: Arc<CollectionRegistry>,
        owner: OwnerId,
    ) -> Self {
        Self {
            store,
            remote,
            registry,
            owner,
        }
    }

    /// Pulls one collection.
    pub fn pull(&self, collection: &CollectionName) -> SyncResult<PullReport> {
        let adapter = self.registry.get(collection)?;
        let since = self.store.watermark(collection)?;
        let fetched = self.remote.fetch_since(collection, self.owner, since)?;
        if fetched.is_empty() {
            return Ok(PullReport::default());
        }

        let mut report = PullReport::default();
        let mut newest = since;
        let mut apply = Vec::with_capacity(fetched.len());
        for mut record in fetched {
            if record.updated_at > newest {
                newest = record.updated_at;
            }
            if let Err(error) = adapter.check(&record) {
                tracing::warn!(%collection, id = %record.id, %error, "skipping undecodable remote record");
                report.skipped += 1;
                continue;
            }
            // Derived fields are recomputed locally, never cached from
            // the remote.
            strip_derived(&mut record, adapter.derived_fields());
            apply.push(record);
        }

        report.applied = apply.len();
        self.store.bulk_put(collection, apply)?;
        // Advance only after the rows are durable, and only to the
        // newest observed timestamp.
        self.store.advance_watermark(collection, newest)?;

        tracing::debug!(
            %collection,
            applied = report.applied,
            skipped = report.skipped,
            "pull complete"
        );
        Ok(report)
    }

    /// Pulls every registered collection, continuing past per-collection
    /// failures. Returns the first error, if any, after all collections
    /// have been attempted.
    pub fn pull_all(&self) -> SyncResult<PullReport> {
        let mut total = PullReport::default();
        let mut first_error = None;
        for collection in self.registry.collections() {
            match self.pull(collection) {
                Ok(report) => {
                    total.applied += report.applied;
                    total.skipped += report.skipped;
                }
                Err(error) => {
                    tracing::warn!(%collection, %error, "pull failed");
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(total),
        }
    }
}
