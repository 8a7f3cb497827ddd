//! Watermarks command implementation.

use satchel_model::{epoch_watermark, watermark_key};
use satchel_store::LocalStore;
use serde::Serialize;
use std::path::Path;

/// A collection's pull watermark.
#[derive(Debug, Serialize)]
pub struct WatermarkRow {
    /// Collection name.
    pub collection: String,
    /// Persistence key for the watermark.
    pub key: String,
    /// Watermark timestamp (RFC 3339), or null if never pulled.
    pub watermark: Option<String>,
}

/// Runs the watermarks command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store journal found at {:?}", path).into());
    }

    let store = LocalStore::open(path)?;
    let mut rows = Vec::new();
    for collection in store.collections()? {
        let at = store.watermark(&collection)?;
        rows.push(WatermarkRow {
            key: watermark_key(&collection),
            collection: collection.to_string(),
            watermark: (at != epoch_watermark()).then(|| at.to_rfc3339()),
        });
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
        _ => {
            if rows.is_empty() {
                println!("No collections cached");
            }
            for row in &rows {
                match &row.watermark {
                    Some(at) => println!("  {:<28} {}", row.key, at),
                    None => println!("  {:<28} never pulled", row.key),
                }
            }
        }
    }

    Ok(())
}
