//! Compact command implementation.

use satchel_store::LocalStore;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store journal found at {:?}", path).into());
    }

    let store = LocalStore::open(path)?;
    let before = store.journal_len()?;

    if dry_run {
        let mut live = store.outbox_len()?;
        for collection in store.collections()? {
            live += store.count(&collection)?;
        }
        println!(
            "Dry run: {} journal entries now, about {} after compaction",
            before, live
        );
        return Ok(());
    }

    let after = store.compact()?;
    println!("Compacted journal: {} entries -> {}", before, after);
    Ok(())
}
