//! Write-ahead log: the durability boundary for every state mutation.
//!
//! The WAL is a single append-only file of newline-delimited JSON records.
//! [`Wal::append`] blocks until the record is fsynced; no derived state may
//! change before its record is on disk. [`Wal::replay`] reads the full
//! ordered record sequence once at startup so the orchestrator can rebuild
//! its in-memory projections.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::WalEvent;

/// One immutable, ordered WAL entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalRecord {
    /// Strictly increasing, gapless sequence number (starts at 1).
    pub sequence: u64,
    /// Wall-clock time the record was appended. Derived entity
    /// timestamps are rebuilt from this value on replay.
    pub timestamp: DateTime<Utc>,
    /// The recorded mutation.
    #[serde(flatten)]
    pub event: WalEvent,
}

/// WAL errors.
#[derive(Debug, Error)]
pub enum WalError {
    /// Underlying medium rejected a read or write.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Record failed to encode or decode.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Replay found a hole in the sequence numbers.
    #[error("sequence gap: expected {expected}, got {got}")]
    SequenceGap {
        /// Sequence number the replay expected next.
        expected: u64,
        /// Sequence number actually read.
        got: u64,
    },

    /// The log was marked unusable after an earlier failed append.
    /// Mutating requests are refused from that point on.
    #[error("wal unavailable after earlier write failure")]
    Unavailable,
}

struct WalInner {
    file: File,
    next_sequence: u64,
}

/// Append-only write-ahead log backed by a newline-delimited JSON file.
pub struct Wal {
    path: PathBuf,
    inner: Mutex<WalInner>,
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wal")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Wal {
    /// Opens (or creates) the WAL file at `path`.
    ///
    /// Scans existing records so appends continue the sequence. A torn
    /// final record (crash between write and fsync) is truncated away
    /// before the append handle is opened.
    ///
    /// # Errors
    ///
    /// Returns a [`WalError`] if the file cannot be opened or existing
    /// records are unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WalError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let (records, valid_len) = scan_records(&path)?;
        let actual_len = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if actual_len > valid_len {
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
            tracing::warn!(
                discarded_bytes = actual_len - valid_len,
                "truncated torn wal tail"
            );
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let next_sequence = records.last().map_or(1, |r| r.sequence + 1);

        Ok(Self {
            path,
            inner: Mutex::new(WalInner {
                file,
                next_sequence,
            }),
        })
    }

    /// Appends an event, blocking until the record is flushed to stable
    /// storage, and returns the durable record.
    ///
    /// # Errors
    ///
    /// Returns a [`WalError`] if the medium rejects the write. Callers
    /// must treat this as fatal and stop accepting mutations.
    pub fn append(&self, event: WalEvent) -> Result<WalRecord, WalError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| WalError::Io(std::io::Error::other("wal lock poisoned")))?;

        let record = WalRecord {
            sequence: inner.next_sequence,
            timestamp: Utc::now(),
            event,
        };

        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        inner.file.write_all(&line)?;
        inner.file.sync_all()?;

        inner.next_sequence += 1;
        Ok(record)
    }

    /// Reads the full ordered record sequence from disk.
    ///
    /// Verifies that sequence numbers are strictly increasing and gapless
    /// starting at 1.
    ///
    /// # Errors
    ///
    /// Returns a [`WalError`] on unreadable records or sequence gaps.
    pub fn replay(&self) -> Result<Vec<WalRecord>, WalError> {
        scan_records(&self.path).map(|(records, _)| records)
    }

    /// Returns the path of the WAL file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads and validates all records in the file at `path`, returning the
/// records and the byte length of the valid prefix.
fn scan_records(path: &Path) -> Result<(Vec<WalRecord>, u64), WalError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut valid_len: u64 = 0;
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break;
        }
        if line.trim().is_empty() {
            valid_len += n as u64;
            continue;
        }
        match serde_json::from_str::<WalRecord>(&line) {
            Ok(record) => {
                let expected = records.last().map_or(1, |r: &WalRecord| r.sequence + 1);
                if record.sequence != expected {
                    return Err(WalError::SequenceGap {
                        expected,
                        got: record.sequence,
                    });
                }
                records.push(record);
                valid_len += n as u64;
            }
            Err(e) => {
                // A torn write can only be the unterminated final line.
                let mut rest = String::new();
                if reader.read_line(&mut rest)? == 0 && !line.ends_with('\n') {
                    tracing::warn!(error = %e, "discarding torn wal tail record");
                    break;
                }
                return Err(e.into());
            }
        }
    }

    Ok((records, valid_len))
}
