//! Collection adapters and the registry of synchronized collections.

use crate::error::{SyncError, SyncResult};
use satchel_model::{strip_derived, CollectionName, Record, RecordDocument};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// Describes how one collection participates in sync.
///
/// Object-safe so the engines can iterate a heterogeneous set of
/// collections without knowing their document types.
pub trait CollectionAdapter: Send + Sync {
    /// The collection this adapter covers.
    fn collection(&self) -> &CollectionName;

    /// Locally computed fields stripped from records before pushing.
    fn derived_fields(&self) -> &'static [&'static str];

    /// Validates that a remote record decodes as this collection's
    /// document type.
    fn check(&self, record: &Record) -> SyncResult<()>;
}

/// A [`CollectionAdapter`] backed by a [`RecordDocument`] type.
pub struct TypedAdapter<T: RecordDocument> {
    collection: CollectionName,
    _marker: PhantomData<fn() -> T>,
}

impl<T: RecordDocument> TypedAdapter<T> {
    /// Creates the adapter for `T`'s collection.
    pub fn new() -> Self {
        Self {
            collection: T::collection(),
            _marker: PhantomData,
        }
    }
}

impl<T: RecordDocument> Default for TypedAdapter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RecordDocument> CollectionAdapter for TypedAdapter<T> {
    fn collection(&self) -> &CollectionName {
        &self.collection
    }

    fn derived_fields(&self) -> &'static [&'static str] {
        T::DERIVED_FIELDS
    }

    fn check(&self, record: &Record) -> SyncResult<()> {
        // Tombstones have no fields to decode.
        if record.is_deleted() {
            return Ok(());
        }
        T::from_record(record)?;
        Ok(())
    }
}

/// The set of collections an engine instance synchronizes.
///
/// Built once at startup; the engines only touch collections that are
/// registered here, so an unknown collection name in a change event is
/// ignored rather than guessed at.
#[derive(Default)]
pub struct CollectionRegistry {
    adapters: BTreeMap<CollectionName, Arc<dyn CollectionAdapter>>,
}

impl CollectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a document type's collection.
    #[must_use]
    pub fn with<T: RecordDocument + 'static>(mut self) -> Self {
        let adapter = TypedAdapter::<T>::new();
        self.adapters
            .insert(adapter.collection().clone(), Arc::new(adapter));
        self
    }

    /// Registers a custom adapter.
    pub fn register(&mut self, adapter: Arc<dyn CollectionAdapter>) {
        self.adapters.insert(adapter.collection().clone(), adapter);
    }

    /// Looks up the adapter for a collection.
    pub fn get(&self, collection: &CollectionName) -> SyncResult<&Arc<dyn CollectionAdapter>> {
        self.adapters
            .get(collection)
            .ok_or_else(|| SyncError::UnknownCollection(collection.clone()))
    }

    /// Returns true if the collection is registered.
    pub fn contains(&self, collection: &CollectionName) -> bool {
        self.adapters.contains_key(collection)
    }

    /// Iterates registered collection names in sorted order.
    pub fn collections(&self) -> impl Iterator<Item = &CollectionName> {
        self.adapters.keys()
    }

    /// Number of registered collections.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Returns true if no collections are registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Returns a record stripped of the collection's derived fields,
    /// ready to push.
    pub fn outbound(&self, collection: &CollectionName, record: &Record) -> SyncResult<Record> {
        let adapter = self.get(collection)?;
        let mut outbound = record.clone();
        strip_derived(&mut outbound, adapter.derived_fields());
        Ok(outbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_model::{ModelError, OwnerId};

    struct Task {
        record: Record,
    }

    impl RecordDocument for Task {
        const COLLECTION: &'static str = "tasks";
        const DERIVED_FIELDS: &'static [&'static str] = &["search_text"];

        fn into_record(self) -> Record {
            self.record
        }

        fn from_record(record: &Record) -> Result<Self, ModelError> {
            if record.field("title").is_none() {
                return Err(ModelError::DocumentDecode {
                    collection: Self::COLLECTION.to_string(),
                    message: "missing title".to_string(),
                });
            }
            Ok(Self {
                record: record.clone(),
            })
        }
    }

    fn titled(title: &str) -> Record {
        let mut fields = serde_json::Map::new();
        fields.insert("title".into(), serde_json::json!(title));
        fields.insert("search_text".into(), serde_json::json!(title.to_lowercase()));
        Record::new(OwnerId::new(), fields)
    }

    #[test]
    fn registry_lookup() {
        let registry = CollectionRegistry::new().with::<Task>();
        let tasks = CollectionName::new("tasks").unwrap();
        let notes = CollectionName::new("notes").unwrap();

        assert!(registry.contains(&tasks));
        assert!(registry.get(&tasks).is_ok());
        assert!(matches!(
            registry.get(&notes),
            Err(SyncError::UnknownCollection(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn outbound_strips_derived_fields() {
        let registry = CollectionRegistry::new().with::<Task>();
        let tasks = CollectionName::new("tasks").unwrap();
        let record = titled("Buy milk");

        let outbound = registry.outbound(&tasks, &record).unwrap();
        assert!(outbound.field("title").is_some());
        assert!(outbound.field("search_text").is_none());
        // The local record is untouched.
        assert!(record.field("search_text").is_some());
    }

    #[test]
    fn typed_adapter_checks_decoding() {
        let adapter = TypedAdapter::<Task>::new();
        assert!(adapter.check(&titled("ok")).is_ok());

        let bad = Record::new(OwnerId::new(), serde_json::Map::new());
        assert!(adapter.check(&bad).is_err());

        // Tombstones always pass.
        let tomb = titled("gone").tombstone(chrono::Utc::now());
        assert!(adapter.check(&tomb).is_ok());
    }
}
