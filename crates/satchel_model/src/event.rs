//! Realtime change notifications.

use crate::record::CollectionName;
use serde::{Deserialize, Serialize};

/// What kind of change a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// A record was inserted or updated.
    Changed,
    /// A record was removed.
    Removed,
}

/// A server-pushed change notification.
///
/// Notifications are deliberately coarse: they name the collection that
/// changed, not the record, and the listener responds with a targeted
/// pull of that collection. Missing a notification is harmless — the
/// scheduled pull catches up via the watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Collection that changed.
    pub collection: CollectionName,
    /// Kind of change.
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Creates a changed-record notification.
    #[must_use]
    pub fn changed(collection: CollectionName) -> Self {
        Self {
            collection,
            kind: ChangeKind::Changed,
        }
    }

    /// Creates a removed-record notification.
    #[must_use]
    pub fn removed(collection: CollectionName) -> Self {
        Self {
            collection,
            kind: ChangeKind::Removed,
        }
    }
}
