//! Outbox command implementation.

use satchel_store::LocalStore;
use serde::Serialize;
use std::path::Path;

/// A pending entry, flattened for display.
#[derive(Debug, Serialize)]
pub struct OutboxRow {
    /// Store-assigned sequence number.
    pub seq: u64,
    /// Target collection.
    pub collection: String,
    /// Mutation kind.
    pub action: String,
    /// Record id the mutation targets.
    pub record_id: String,
    /// Failed push attempts so far.
    pub retries: u32,
    /// When the mutation was enqueued (RFC 3339).
    pub enqueued_at: String,
}

/// Runs the outbox command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store journal found at {:?}", path).into());
    }

    let store = LocalStore::open(path)?;
    let snapshot = store.outbox_snapshot()?;
    let total = snapshot.len();

    let rows: Vec<OutboxRow> = snapshot
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|entry| OutboxRow {
            seq: entry.seq,
            collection: entry.collection.to_string(),
            action: format!("{:?}", entry.action).to_lowercase(),
            record_id: entry.payload.id.to_string(),
            retries: entry.retries,
            enqueued_at: entry.enqueued_at.to_rfc3339(),
        })
        .collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            if rows.is_empty() {
                println!("Outbox is empty");
            } else {
                println!("{} pending (showing {})", total, rows.len());
                for row in &rows {
                    println!(
                        "  #{:<6} {:<8} {:<16} {} retries={} enqueued={}",
                        row.seq, row.action, row.collection, row.record_id, row.retries,
                        row.enqueued_at
                    );
                }
            }
        }
    }

    Ok(())
}
