//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use satchel_model::{CollectionName, OutboxEntry, OwnerId, Record, RecordId, SyncAction};

/// Strategy for generating valid record IDs.
pub fn record_id_strategy() -> impl Strategy<Value = RecordId> {
    prop::array::uniform16(any::<u8>())
        .prop_map(|bytes| RecordId::from_uuid(uuid::Uuid::from_bytes(bytes)))
}

/// Strategy for generating valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = CollectionName> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}")
        .expect("Invalid regex")
        .prop_map(|s| CollectionName::new(s).expect("generated name is valid"))
}

/// Strategy for generating timestamps within a bounded range.
///
/// Bounded so comparisons stay well clear of chrono's representable
/// extremes.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..=2_000_000_000).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0)
            .single()
            .expect("in-range timestamp")
    })
}

/// Strategy for generating sync actions.
pub fn sync_action_strategy() -> impl Strategy<Value = SyncAction> {
    prop_oneof![
        Just(SyncAction::Insert),
        Just(SyncAction::Update),
        Just(SyncAction::Delete),
    ]
}

/// Strategy for generating records with a few string fields.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    (
        record_id_strategy(),
        prop::collection::btree_map("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,24}", 0..5),
        timestamp_strategy(),
    )
        .prop_map(|(id, raw_fields, at)| {
            let mut fields = serde_json::Map::new();
            for (k, v) in raw_fields {
                fields.insert(k, serde_json::json!(v));
            }
            let mut record = Record::new(OwnerId::new(), fields);
            record.id = id;
            record.created_at = at;
            record.updated_at = at;
            record
        })
}

/// Strategy for generating outbox entries.
pub fn outbox_entry_strategy() -> impl Strategy<Value = OutboxEntry> {
    (collection_name_strategy(), sync_action_strategy(), record_strategy()).prop_map(
        |(collection, action, record)| {
            let payload = if action == SyncAction::Delete {
                record.tombstone(record.updated_at)
            } else {
                record
            };
            OutboxEntry::new(collection, action, payload)
        },
    )
}

/// Strategy for generating an outbox snapshot with assigned seqs.
pub fn outbox_snapshot_strategy(max_len: usize) -> impl Strategy<Value = Vec<OutboxEntry>> {
    prop::collection::vec(outbox_entry_strategy(), 0..max_len).prop_map(|mut entries| {
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.seq = i as u64 + 1;
        }
        entries
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_collection_names_are_valid(name in collection_name_strategy()) {
            prop_assert!(!name.as_str().is_empty());
        }

        #[test]
        fn delete_entries_carry_tombstones(entry in outbox_entry_strategy()) {
            if entry.action == SyncAction::Delete {
                prop_assert!(entry.payload.is_deleted());
                prop_assert!(entry.payload.fields.is_empty());
            }
        }

        #[test]
        fn snapshot_seqs_are_strictly_increasing(entries in outbox_snapshot_strategy(16)) {
            for window in entries.windows(2) {
                prop_assert!(window[0].seq < window[1].seq);
            }
        }
    }
}
