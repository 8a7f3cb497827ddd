//! Per-collection pull watermarks.

use crate::record::CollectionName;
use chrono::{DateTime, TimeZone, Utc};

/// The newest remote `updated_at` already pulled for a collection.
///
/// Watermarks are monotonically non-decreasing and advance to the
/// maximum timestamp observed in a pulled batch, never to wall-clock
/// "now" — advancing by observation tolerates clock skew and cannot
/// skip records written concurrently with the pull.
pub type Watermark = DateTime<Utc>;

/// The watermark used before any pull has completed.
#[must_use]
pub fn epoch_watermark() -> Watermark {
    Utc.timestamp_opt(0, 0).single().expect("epoch is valid")
}

/// Key under which a collection's watermark is persisted.
///
/// Layout: `last_sync_<collection>`, one ISO-8601 value per
/// `(user, collection)` in the simple key-value area.
#[must_use]
pub fn watermark_key(collection: &CollectionName) -> String {
    format!("last_sync_{collection}")
}
