//! Drain planning: partitioning an outbox snapshot into push batches.

use crate::outbox::{OutboxEntry, SyncAction};
use crate::record::{CollectionName, Record, RecordId};

/// One remote round-trip's worth of mutations for a single collection.
///
/// A batch is either an upsert of full records or a delete by id-set.
/// It remembers the sequence numbers of the contributing outbox entries
/// so the push engine can settle or retry exactly those entries.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionBatch {
    /// Batched insert/update payloads for one collection.
    Upsert {
        /// Target collection.
        collection: CollectionName,
        /// Records to upsert, in enqueue order.
        records: Vec<Record>,
        /// Contributing outbox entry seqs.
        seqs: Vec<u64>,
    },
    /// Batched delete-by-id-set for one collection.
    Delete {
        /// Target collection.
        collection: CollectionName,
        /// Ids to delete.
        ids: Vec<RecordId>,
        /// Contributing outbox entry seqs.
        seqs: Vec<u64>,
    },
}

impl CollectionBatch {
    /// Returns the target collection.
    #[must_use]
    pub fn collection(&self) -> &CollectionName {
        match self {
            CollectionBatch::Upsert { collection, .. } => collection,
            CollectionBatch::Delete { collection, .. } => collection,
        }
    }

    /// Returns the contributing outbox entry seqs.
    #[must_use]
    pub fn seqs(&self) -> &[u64] {
        match self {
            CollectionBatch::Upsert { seqs, .. } => seqs,
            CollectionBatch::Delete { seqs, .. } => seqs,
        }
    }

    /// Returns the number of mutations folded into this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seqs().len()
    }

    /// Returns true if the batch carries no mutations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seqs().is_empty()
    }
}

/// A full drain cycle's batches, in execution order.
///
/// Partitioning turns O(n) individual round-trips into at most two
/// round-trips per distinct collection: all deletes for a collection
/// collapse into one id-set, all inserts and updates into one upsert.
/// Collections execute in discovery order (first appearance in the
/// snapshot); deletes run before upserts within a collection so a
/// delete-then-recreate sequence converges on the recreated record.
#[derive(Debug, Clone, Default)]
pub struct DrainPlan {
    batches: Vec<CollectionBatch>,
}

impl DrainPlan {
    /// Builds a plan from an outbox snapshot.
    ///
    /// Entries enqueued after the snapshot was taken are not part of
    /// the plan; they are picked up by the next drain cycle.
    #[must_use]
    pub fn build(snapshot: &[OutboxEntry]) -> Self {
        let mut order: Vec<CollectionName> = Vec::new();
        let mut deletes: Vec<(CollectionName, Vec<RecordId>, Vec<u64>)> = Vec::new();
        let mut upserts: Vec<(CollectionName, Vec<Record>, Vec<u64>)> = Vec::new();

        for entry in snapshot {
            if !order.contains(&entry.collection) {
                order.push(entry.collection.clone());
            }
            match entry.action {
                SyncAction::Delete => {
                    let slot = match deletes.iter_mut().find(|(c, _, _)| c == &entry.collection) {
                        Some(slot) => slot,
                        None => {
                            deletes.push((entry.collection.clone(), Vec::new(), Vec::new()));
                            deletes.last_mut().expect("just pushed")
                        }
                    };
                    slot.1.push(entry.payload.id);
                    slot.2.push(entry.seq);
                }
                SyncAction::Insert | SyncAction::Update => {
                    let slot = match upserts.iter_mut().find(|(c, _, _)| c == &entry.collection) {
                        Some(slot) => slot,
                        None => {
                            upserts.push((entry.collection.clone(), Vec::new(), Vec::new()));
                            upserts.last_mut().expect("just pushed")
                        }
                    };
                    slot.1.push(entry.payload.clone());
                    slot.2.push(entry.seq);
                }
            }
        }

        let mut batches = Vec::new();
        for collection in order {
            if let Some(pos) = deletes.iter().position(|(c, _, _)| c == &collection) {
                let (collection, ids, seqs) = deletes.remove(pos);
                batches.push(CollectionBatch::Delete {
                    collection,
                    ids,
                    seqs,
                });
            }
            if let Some(pos) = upserts.iter().position(|(c, _, _)| c == &collection) {
                let (collection, records, seqs) = upserts.remove(pos);
                batches.push(CollectionBatch::Upsert {
                    collection,
                    records,
                    seqs,
                });
            }
        }

        Self { batches }
    }

    /// Returns the batches in execution order.
    #[must_use]
    pub fn batches(&self) -> &[CollectionBatch] {
        &self.batches
    }

    /// Returns true if the plan contains no batches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total number of mutations across all batches.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.batches.iter().map(CollectionBatch::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::OwnerId;

    fn entry(seq: u64, collection: &str, action: SyncAction) -> OutboxEntry {
        let mut e = OutboxEntry::new(
            CollectionName::new(collection).unwrap(),
            action,
            Record::new(OwnerId::new(), serde_json::Map::new()),
        );
        e.seq = seq;
        e
    }

    #[test]
    fn empty_snapshot_yields_empty_plan() {
        let plan = DrainPlan::build(&[]);
        assert!(plan.is_empty());
        assert_eq!(plan.mutation_count(), 0);
    }

    #[test]
    fn inserts_and_updates_merge_into_one_upsert() {
        let snapshot = vec![
            entry(1, "tasks", SyncAction::Insert),
            entry(2, "tasks", SyncAction::Update),
            entry(3, "tasks", SyncAction::Insert),
        ];
        let plan = DrainPlan::build(&snapshot);
        assert_eq!(plan.batches().len(), 1);
        match &plan.batches()[0] {
            CollectionBatch::Upsert { records, seqs, .. } => {
                assert_eq!(records.len(), 3);
                assert_eq!(seqs, &[1, 2, 3]);
            }
            other => panic!("expected upsert batch, got {other:?}"),
        }
    }

    #[test]
    fn deletes_collapse_into_one_id_set() {
        let snapshot = vec![
            entry(1, "pages", SyncAction::Delete),
            entry(2, "pages", SyncAction::Delete),
        ];
        let plan = DrainPlan::build(&snapshot);
        assert_eq!(plan.batches().len(), 1);
        match &plan.batches()[0] {
            CollectionBatch::Delete { ids, seqs, .. } => {
                assert_eq!(ids.len(), 2);
                assert_eq!(seqs, &[1, 2]);
            }
            other => panic!("expected delete batch, got {other:?}"),
        }
    }

    #[test]
    fn collections_keep_discovery_order() {
        let snapshot = vec![
            entry(1, "pages", SyncAction::Insert),
            entry(2, "tasks", SyncAction::Insert),
            entry(3, "pages", SyncAction::Update),
        ];
        let plan = DrainPlan::build(&snapshot);
        assert_eq!(plan.batches().len(), 2);
        assert_eq!(plan.batches()[0].collection().as_str(), "pages");
        assert_eq!(plan.batches()[1].collection().as_str(), "tasks");
    }

    #[test]
    fn deletes_execute_before_upserts_per_collection() {
        let snapshot = vec![
            entry(1, "tasks", SyncAction::Insert),
            entry(2, "tasks", SyncAction::Delete),
        ];
        let plan = DrainPlan::build(&snapshot);
        assert_eq!(plan.batches().len(), 2);
        assert!(matches!(plan.batches()[0], CollectionBatch::Delete { .. }));
        assert!(matches!(plan.batches()[1], CollectionBatch::Upsert { .. }));
    }

    #[test]
    fn round_trip_count_is_bounded_by_collections() {
        // 100 mutations over 2 collections must plan at most 4 batches.
        let mut snapshot = Vec::new();
        for i in 0..100u64 {
            let collection = if i % 2 == 0 { "tasks" } else { "pages" };
            let action = if i % 5 == 0 {
                SyncAction::Delete
            } else {
                SyncAction::Update
            };
            snapshot.push(entry(i + 1, collection, action));
        }
        let plan = DrainPlan::build(&snapshot);
        assert!(plan.batches().len() <= 4);
        assert_eq!(plan.mutation_count(), 100);
    }
}
