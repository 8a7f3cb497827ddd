//! Append-only JSON-lines journal.
//!
//! Every logical store mutation is appended to the journal before the
//! in-memory tables change, so a crash at any point replays to a
//! consistent state. A torn final line (crash mid-append) is tolerated
//! and discarded on replay; corruption anywhere else is an error.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use satchel_model::{CollectionName, OutboxEntry, Record, RecordId};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One logical mutation in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalEntry {
    /// A record was written to a collection table.
    Put {
        /// Target collection.
        collection: CollectionName,
        /// The full record.
        record: Record,
    },
    /// A record was removed from a collection table.
    Delete {
        /// Target collection.
        collection: CollectionName,
        /// Removed record id.
        id: RecordId,
    },
    /// An entry was appended to the outbox (seq already assigned).
    OutboxPush {
        /// The appended entry.
        entry: OutboxEntry,
    },
    /// Outbox entries were settled after a successful push.
    OutboxSettle {
        /// Settled entry seqs.
        seqs: Vec<u64>,
    },
    /// Outbox entries failed a push attempt.
    ///
    /// Replay re-applies the same increment-then-drop rule, so the cap
    /// is recorded alongside the seqs.
    OutboxRetry {
        /// Entry seqs that failed.
        seqs: Vec<u64>,
        /// Retry cap in force when the failure was recorded.
        max_retries: u32,
    },
    /// A collection watermark advanced.
    Watermark {
        /// Target collection.
        collection: CollectionName,
        /// New watermark value.
        at: DateTime<Utc>,
    },
}

/// Append handle over the journal file.
pub(crate) struct Journal {
    path: PathBuf,
    file: File,
    /// Number of entries appended since open (including replayed ones).
    entries: usize,
}

impl Journal {
    /// Opens the journal for appending, creating it if missing.
    pub(crate) fn open(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            entries: 0,
        })
    }

    /// Appends one entry and flushes it to the OS.
    pub(crate) fn append(&mut self, entry: &JournalEntry) -> StoreResult<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()?;
        self.entries += 1;
        Ok(())
    }

    /// Returns the number of entries appended through this handle.
    pub(crate) fn entries(&self) -> usize {
        self.entries
    }

    pub(crate) fn note_replayed(&mut self, count: usize) {
        self.entries += count;
    }

    /// Atomically replaces the journal with the given entries.
    ///
    /// Used by compaction: the live state is rewritten to a sibling
    /// temp file which is then renamed over the journal.
    pub(crate) fn rewrite(&mut self, entries: &[JournalEntry]) -> StoreResult<()> {
        let tmp = self.path.with_extension("compact");
        {
            let mut out = File::create(&tmp)?;
            for entry in entries {
                let mut line = serde_json::to_vec(entry)?;
                line.push(b'\n');
                out.write_all(&line)?;
            }
            out.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.entries = entries.len();
        Ok(())
    }
}

/// Replays a journal file into its entry sequence.
///
/// A decode failure on the final line is treated as a torn write and
/// dropped with a warning; a failure on any earlier line is corruption.
pub(crate) fn replay(path: &Path) -> StoreResult<Vec<JournalEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
    let mut entries = Vec::with_capacity(lines.len());

    let last = lines.len();
    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) if idx + 1 == last => {
                tracing::warn!(line = idx + 1, error = %e, "discarding torn journal tail");
            }
            Err(e) => return Err(StoreError::journal(idx + 1, e.to_string())),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_model::OwnerId;
    use std::io::Write as _;

    fn put_entry() -> JournalEntry {
        JournalEntry::Put {
            collection: CollectionName::new("tasks").unwrap(),
            record: Record::new(OwnerId::new(), serde_json::Map::new()),
        }
    }

    #[test]
    fn append_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.journal");

        let mut journal = Journal::open(&path).unwrap();
        journal.append(&put_entry()).unwrap();
        journal
            .append(&JournalEntry::OutboxSettle { seqs: vec![1, 2] })
            .unwrap();
        assert_eq!(journal.entries(), 2);

        let entries = replay(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[1], JournalEntry::OutboxSettle { .. }));
    }

    #[test]
    fn replay_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = replay(&dir.path().join("absent.journal")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn torn_tail_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.journal");

        let mut journal = Journal::open(&path).unwrap();
        journal.append(&put_entry()).unwrap();
        drop(journal);

        // Simulate a crash mid-append.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"op\":\"put\",\"collec").unwrap();
        drop(file);

        let entries = replay(&path).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn mid_file_corruption_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.journal");

        let mut file = File::create(&path).unwrap();
        file.write_all(b"not json at all\n").unwrap();
        let line = serde_json::to_string(&put_entry()).unwrap();
        file.write_all(line.as_bytes()).unwrap();
        file.write_all(b"\n").unwrap();
        drop(file);

        let err = replay(&path).unwrap_err();
        assert!(matches!(err, StoreError::Journal { line: 1, .. }));
    }

    #[test]
    fn rewrite_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.journal");

        let mut journal = Journal::open(&path).unwrap();
        for _ in 0..5 {
            journal.append(&put_entry()).unwrap();
        }

        journal.rewrite(&[put_entry()]).unwrap();
        assert_eq!(journal.entries(), 1);
        assert_eq!(replay(&path).unwrap().len(), 1);

        // The handle still appends after a rewrite.
        journal.append(&put_entry()).unwrap();
        assert_eq!(replay(&path).unwrap().len(), 2);
    }
}
