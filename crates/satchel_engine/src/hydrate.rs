//! First-run hydration of empty local collections.

use crate::adapter::CollectionRegistry;
use crate::remote::RemoteStore;
use parking_lot::Mutex;
use satchel_model::{strip_derived, CollectionName, OwnerId};
use satchel_store::LocalStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Bootstraps empty local collections from the remote.
///
/// Hydration runs at most once per collection per engine lifetime, and
/// only when the local cache is empty; a non-empty cache means the
/// store already carries state (possibly including offline edits) and
/// catch-up belongs to the pull engine. Failures are logged and
/// swallowed so a cold start without connectivity still comes up.
pub struct Hydrator {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    registry: Arc<CollectionRegistry>,
    owner: OwnerId,
    attempted: Mutex<HashSet<CollectionName>>,
}

impl Hydrator {
    /// Creates a hydrator scoped to one owner's data.
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
            attempted: Mutex::new(HashSet::new()),
        }
    }

    /// Hydrates one collection if it is empty and not yet attempted.
    ///
    /// Returns the number of records loaded (zero when hydration was
    /// skipped or failed).
    pub fn hydrate(&self, collection: &CollectionName) -> usize {
        if !self.attempted.lock().insert(collection.clone()) {
            return 0;
        }
        match self.try_hydrate(collection) {
            Ok(loaded) => loaded,
            Err(error) => {
                tracing::warn!(%collection, %error, "hydration failed, deferring to pull");
                0
            }
        }
    }

    /// Hydrates every registered collection.
    pub fn hydrate_all(&self) -> usize {
        self.registry
            .collections()
            .map(|collection| self.hydrate(collection))
            .sum()
    }

    fn try_hydrate(&self, collection: &CollectionName) -> crate::error::SyncResult<usize> {
        let adapter = self.registry.get(collection)?;
        if self.store.count(collection)? > 0 {
            tracing::debug!(%collection, "cache is warm, skipping hydration");
            return Ok(0);
        }

        let mut records = self.remote.fetch_all(collection, self.owner)?;
        let loaded = records.len();
        let newest = records.iter().map(|r| r.updated_at).max();
        for record in &mut records {
            strip_derived(record, adapter.derived_fields());
        }

        self.store.bulk_put(collection, records)?;
        if let Some(newest) = newest {
            self.store.advance_watermark(collection, newest)?;
        }

        tracing::info!(%collection, loaded, "hydrated collection");
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use satchel_model::{epoch_watermark, ModelError, OwnerId, Record, RecordDocument};

    struct Task;

    impl RecordDocument for Task {
        const COLLECTION: &'static str = "tasks";

        fn into_record(self) -> Record {
            unreachable!("tests only decode")
        }

        fn from_record(_record: &Record) -> Result<Self, ModelError> {
            Ok(Self)
        }
    }

    fn tasks() -> CollectionName {
        CollectionName::new("tasks").unwrap()
    }

    fn owner() -> OwnerId {
        OwnerId::from_uuid(uuid::Uuid::from_u128(42))
    }

    fn titled(title: &str) -> Record {
        let mut fields = serde_json::Map::new();
        fields.insert("title".into(), serde_json::json!(title));
        Record::new(owner(), fields)
    }

    fn hydrator(remote: Arc<MemoryRemote>) -> (Arc<LocalStore>, Hydrator) {
        let store = Arc::new(LocalStore::open_in_memory());
        let registry = Arc::new(CollectionRegistry::new().with::<Task>());
        let hydrator = Hydrator::new(Arc::clone(&store), remote, registry, owner());
        (store, hydrator)
    }

    #[test]
    fn empty_collection_is_hydrated_once() {
        let remote = Arc::new(MemoryRemote::new());
        let (store, hydrator) = hydrator(Arc::clone(&remote));
        remote.seed(&tasks(), vec![titled("a"), titled("b")]);

        assert_eq!(hydrator.hydrate(&tasks()), 2);
        assert_eq!(store.count(&tasks()).unwrap(), 2);
        assert_ne!(store.watermark(&tasks()).unwrap(), epoch_watermark());

        // A second call does not refetch.
        assert_eq!(hydrator.hydrate(&tasks()), 0);
        assert_eq!(remote.fetch_calls(), 1);
    }

    #[test]
    fn warm_cache_skips_hydration() {
        let remote = Arc::new(MemoryRemote::new());
        let (store, hydrator) = hydrator(Arc::clone(&remote));

        store.put(&tasks(), titled("offline edit")).unwrap();
        remote.seed(&tasks(), vec![titled("remote")]);

        assert_eq!(hydrator.hydrate(&tasks()), 0);
        assert_eq!(store.count(&tasks()).unwrap(), 1);
        assert_eq!(remote.fetch_calls(), 0);
    }

    #[test]
    fn hydration_failure_is_swallowed() {
        let remote = Arc::new(MemoryRemote::new());
        remote.set_online(false);
        let (store, hydrator) = hydrator(Arc::clone(&remote));

        assert_eq!(hydrator.hydrate(&tasks()), 0);
        assert_eq!(store.count(&tasks()).unwrap(), 0);
    }

    #[test]
    fn hydrate_all_covers_the_registry() {
        let remote = Arc::new(MemoryRemote::new());
        let (_store, hydrator) = hydrator(Arc::clone(&remote));
        remote.seed(&tasks(), vec![titled("only")]);

        assert_eq!(hydrator.hydrate_all(), 1);
    }
}
