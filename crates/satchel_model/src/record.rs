//! Records and identifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Errors produced while constructing or converting model types.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A collection name contained characters outside `[a-z0-9_]`.
    #[error("invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    /// A record id string could not be parsed as a UUID.
    #[error("invalid record id: {0}")]
    InvalidRecordId(#[from] uuid::Error),

    /// A typed document could not be decoded from a record's fields.
    #[error("document decode failed for collection {collection}: {message}")]
    DocumentDecode {
        /// Collection the record came from.
        collection: String,
        /// Description of the failure.
        message: String,
    },
}

/// Unique identifier for a record.
///
/// Record ids are client-generated 128-bit UUIDs, so offline creates
/// never need a round-trip to allocate an id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Creates a new random record id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a record id from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a record id from its string form.
    pub fn parse(s: &str) -> Result<Self, ModelError> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier of the user owning a record.
///
/// Every record belongs to exactly one owner; all remote reads and
/// writes are scoped by this id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(Uuid);

impl OwnerId {
    /// Creates a new random owner id (useful in tests).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an owner id from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerId({})", self.0)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a synchronized collection.
///
/// Collection names are restricted to `[a-z0-9_]+` so they can double
/// as journal table keys and watermark key suffixes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    /// Creates a validated collection name.
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
        if valid {
            Ok(Self(name))
        } else {
            Err(ModelError::InvalidCollectionName(name))
        }
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionName({:?})", self.0)
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A row from a synchronized collection.
///
/// Records carry their collection-specific fields as a JSON map, plus
/// the bookkeeping columns shared by every synchronized table.
/// `updated_at` is authoritative for ordering; deletion is a field
/// mutation (`deleted_at`), never a hard delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Client-generated record id.
    pub id: RecordId,
    /// Owning user.
    pub owner: OwnerId,
    /// Collection-specific fields.
    pub fields: serde_json::Map<String, serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modification timestamp; authoritative for ordering.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Creates a new record with fresh timestamps.
    #[must_use]
    pub fn new(owner: OwnerId, fields: serde_json::Map<String, serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            owner,
            fields,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Returns true if the record carries a soft-delete marker.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Bumps `updated_at` to the given instant.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Produces the minimal id-plus-tombstone payload used for deletes.
    #[must_use]
    pub fn tombstone(&self, now: DateTime<Utc>) -> Record {
        Record {
            id: self.id,
            owner: self.owner,
            fields: serde_json::Map::new(),
            created_at: self.created_at,
            updated_at: now,
            deleted_at: Some(now),
        }
    }

    /// Returns a field by name, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

/// Removes non-persistable derived fields from a record before it is
/// sent remotely.
///
/// Derived fields (full-text search vectors and the like) are computed
/// locally and are not columns the remote schema accepts; the payload
/// pushed upstream must be a subset of the remote columns.
pub fn strip_derived(record: &mut Record, derived: &[&str]) {
    for name in derived {
        record.fields.remove(*name);
    }
}

/// A typed document stored in a synchronized collection.
///
/// Each of the managed entity types (tasks, pages, flashcards, ...)
/// implements this to plug into the engine's typed adapters: the
/// collection it lives in, the derived fields to strip before pushing,
/// and the conversion to and from the generic [`Record`] shape.
pub trait RecordDocument: Sized {
    /// Name of the collection this document type is stored in.
    const COLLECTION: &'static str;

    /// Locally computed fields that must not be sent remotely.
    const DERIVED_FIELDS: &'static [&'static str] = &[];

    /// Converts the document into its record representation.
    fn into_record(self) -> Record;

    /// Decodes a document from a record.
    fn from_record(record: &Record) -> Result<Self, ModelError>;

    /// Returns the validated collection name for this document type.
    fn collection() -> CollectionName {
        CollectionName::new(Self::COLLECTION).expect("document collection names are static")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_are_unique() {
        assert_ne!(RecordId::new(), RecordId::new());
    }

    #[test]
    fn record_id_parse_roundtrip() {
        let id = RecordId::new();
        let parsed = RecordId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn record_id_parse_rejects_garbage() {
        assert!(RecordId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn collection_name_validation() {
        assert!(CollectionName::new("tasks").is_ok());
        assert!(CollectionName::new("flash_cards2").is_ok());
        assert!(CollectionName::new("").is_err());
        assert!(CollectionName::new("Tasks").is_err());
        assert!(CollectionName::new("tasks-v2").is_err());
    }

    #[test]
    fn new_record_is_not_deleted() {
        let record = Record::new(OwnerId::new(), serde_json::Map::new());
        assert!(!record.is_deleted());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn tombstone_keeps_id_and_drops_fields() {
        let mut fields = serde_json::Map::new();
        fields.insert("title".into(), serde_json::json!("Buy milk"));
        let record = Record::new(OwnerId::new(), fields);

        let now = Utc::now();
        let tomb = record.tombstone(now);

        assert_eq!(tomb.id, record.id);
        assert_eq!(tomb.owner, record.owner);
        assert!(tomb.fields.is_empty());
        assert!(tomb.is_deleted());
        assert_eq!(tomb.updated_at, now);
    }

    #[test]
    fn strip_derived_removes_only_named_fields() {
        let mut fields = serde_json::Map::new();
        fields.insert("title".into(), serde_json::json!("Buy milk"));
        fields.insert("search_vector".into(), serde_json::json!("buy milk"));
        let mut record = Record::new(OwnerId::new(), fields);

        strip_derived(&mut record, &["search_vector"]);

        assert!(record.field("title").is_some());
        assert!(record.field("search_vector").is_none());
    }

    #[test]
    fn record_serde_roundtrip() {
        let mut fields = serde_json::Map::new();
        fields.insert("title".into(), serde_json::json!("Read"));
        let record = Record::new(OwnerId::new(), fields);

        let json = serde_json::to_string(&record).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
