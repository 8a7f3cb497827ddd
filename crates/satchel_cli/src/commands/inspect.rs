//! Inspect command implementation.

use satchel_store::LocalStore;
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Journal path.
    pub path: String,
    /// Journal file size in bytes.
    pub journal_size: u64,
    /// Number of journal entries.
    pub journal_entries: usize,
    /// Total cached records across collections.
    pub record_count: usize,
    /// Records carrying a soft-delete marker.
    pub tombstone_count: usize,
    /// Pending outbox entries.
    pub outbox_pending: usize,
    /// Per-collection statistics (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<CollectionStats>>,
}

/// Statistics for a single collection.
#[derive(Debug, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,
    /// Number of cached records.
    pub records: usize,
    /// Number of soft-deleted records.
    pub tombstones: usize,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    show_collections: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store journal found at {:?}", path).into());
    }

    let store = LocalStore::open(path)?;
    let journal_size = std::fs::metadata(path)?.len();

    let mut record_count = 0;
    let mut tombstone_count = 0;
    let mut stats = Vec::new();
    for collection in store.collections()? {
        let records = store.count(&collection)?;
        let tombstones = store.query(&collection, |r| r.is_deleted())?.len();
        record_count += records;
        tombstone_count += tombstones;
        stats.push(CollectionStats {
            name: collection.to_string(),
            records,
            tombstones,
        });
    }

    let result = InspectResult {
        path: path.display().to_string(),
        journal_size,
        journal_entries: store.journal_len()?,
        record_count,
        tombstone_count,
        outbox_pending: store.outbox_len()?,
        collections: show_collections.then_some(stats),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text(&result),
    }

    Ok(())
}

fn print_text(result: &InspectResult) {
    println!("Store: {}", result.path);
    println!("  Journal size:    {} bytes", result.journal_size);
    println!("  Journal entries: {}", result.journal_entries);
    println!("  Records:         {}", result.record_count);
    println!("  Tombstones:      {}", result.tombstone_count);
    println!("  Outbox pending:  {}", result.outbox_pending);
    if let Some(collections) = &result.collections {
        println!("  Collections:");
        for c in collections {
            println!(
                "    {:<20} {} records, {} tombstones",
                c.name, c.records, c.tombstones
            );
        }
    }
}
