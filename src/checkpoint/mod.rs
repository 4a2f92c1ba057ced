//! Checkpoint persistence for incremental loading.
//!
//! The checkpoint is a single non-negative integer: the number of source
//! rows already durably loaded for a given (source, stage, table) triple.
//! It is read at the start of a run and advanced only after the staged
//! batch has been copied into the table.
//!
//! # Atomic Writes
//!
//! Checkpoint updates use the atomic write pattern:
//! 1. Write to a temp file: `{key}.checkpoint.tmp`
//! 2. Rename to the final path: `{key}.checkpoint`
//!
//! A reader can never observe a partially written value.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use snafu::prelude::*;
use tracing::{debug, warn};

use crate::error::{CheckpointError, CommitSnafu, CreateDirSnafu, WriteStateSnafu};
use crate::warehouse::ObjectName;

/// Identity of a checkpoint: one per (source, stage, table) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointKey(String);

impl CheckpointKey {
    pub fn new(source: &Path, stage: &ObjectName, table: &ObjectName) -> Self {
        let raw = format!("{}__{}__{}", source.display(), stage, table);
        let sanitized: String = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Self(sanitized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability seam for checkpoint state.
///
/// `read` is deliberately infallible: an absent, unreadable, or corrupt
/// checkpoint defaults to 0 (with a warning for the latter two) so a bad
/// state file can never wedge the pipeline. `write` must be atomic with
/// respect to a subsequent `read`.
pub trait CheckpointStore: Send + Sync {
    /// Number of source rows already loaded for this key.
    fn read(&self, key: &CheckpointKey) -> u64;

    /// Persist the new row count. Called once per successful run.
    fn write(&self, key: &CheckpointKey, rows: u64) -> Result<(), CheckpointError>;
}

/// File-backed checkpoint store.
///
/// One decimal-text file per key under `dir`, e.g.
/// `.snowdrift/data_customers_csv__DB_PUBLIC_STG__DB_PUBLIC_TBL.checkpoint`.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn state_path(&self, key: &CheckpointKey) -> PathBuf {
        self.dir.join(format!("{key}.checkpoint"))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn read(&self, key: &CheckpointKey) -> u64 {
        let path = self.state_path(key);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = %key, "No checkpoint found, starting from 0");
                return 0;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read checkpoint, using 0");
                return 0;
            }
        };

        match contents.trim().parse::<u64>() {
            Ok(rows) => {
                debug!(key = %key, rows, "Loaded checkpoint");
                rows
            }
            Err(_) => {
                warn!(
                    key = %key,
                    content = contents.trim(),
                    "Checkpoint content is not a valid row count, using 0"
                );
                0
            }
        }
    }

    fn write(&self, key: &CheckpointKey, rows: u64) -> Result<(), CheckpointError> {
        std::fs::create_dir_all(&self.dir).context(CreateDirSnafu {
            path: self.dir.display().to_string(),
        })?;

        let path = self.state_path(key);
        let tmp = self.dir.join(format!("{key}.checkpoint.tmp"));

        std::fs::write(&tmp, format!("{rows}\n")).context(WriteStateSnafu {
            path: tmp.display().to_string(),
        })?;
        std::fs::rename(&tmp, &path).context(CommitSnafu {
            path: path.display().to_string(),
        })?;

        debug!(key = %key, rows, "Saved checkpoint");
        Ok(())
    }
}

/// In-memory checkpoint store, for tests and dry runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    values: Mutex<HashMap<String, u64>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn read(&self, key: &CheckpointKey) -> u64 {
        let values = self.values.lock().expect("checkpoint map lock poisoned");
        values.get(key.as_str()).copied().unwrap_or(0)
    }

    fn write(&self, key: &CheckpointKey, rows: u64) -> Result<(), CheckpointError> {
        let mut values = self.values.lock().expect("checkpoint map lock poisoned");
        values.insert(key.as_str().to_string(), rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_key() -> CheckpointKey {
        CheckpointKey::new(
            Path::new("data/customers.csv"),
            &ObjectName::parse("DB.S.STG").unwrap(),
            &ObjectName::parse("DB.S.TBL").unwrap(),
        )
    }

    #[test]
    fn test_key_is_filesystem_safe() {
        let key = test_key();
        assert!(key
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        assert!(key.as_str().contains("customers_csv"));
    }

    #[test]
    fn test_read_absent_defaults_to_zero() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        assert_eq!(store.read(&test_key()), 0);
    }

    #[test]
    fn test_write_then_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let key = test_key();

        store.write(&key, 42).unwrap();
        assert_eq!(store.read(&key), 42);

        store.write(&key, 57).unwrap();
        assert_eq!(store.read(&key), 57);
    }

    #[test]
    fn test_read_corrupt_defaults_to_zero() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let key = test_key();

        std::fs::write(
            dir.path().join(format!("{key}.checkpoint")),
            "not a number",
        )
        .unwrap();
        assert_eq!(store.read(&key), 0);

        // Negative counts are also corrupt.
        std::fs::write(dir.path().join(format!("{key}.checkpoint")), "-3").unwrap();
        assert_eq!(store.read(&key), 0);
    }

    #[test]
    fn test_read_tolerates_surrounding_whitespace() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let key = test_key();

        std::fs::write(dir.path().join(format!("{key}.checkpoint")), " 15\n").unwrap();
        assert_eq!(store.read(&key), 15);
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let key = test_key();

        store.write(&key, 10).unwrap();

        assert!(!dir.path().join(format!("{key}.checkpoint.tmp")).exists());
        assert!(dir.path().join(format!("{key}.checkpoint")).exists());
    }

    #[test]
    fn test_write_creates_directory_on_demand() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("state").join("checkpoints");
        let store = FileCheckpointStore::new(&nested);

        store.write(&test_key(), 7).unwrap();
        assert_eq!(store.read(&test_key()), 7);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryCheckpointStore::new();
        let key = test_key();

        assert_eq!(store.read(&key), 0);
        store.write(&key, 99).unwrap();
        assert_eq!(store.read(&key), 99);
    }

    #[test]
    fn test_keys_are_independent() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        let stage = ObjectName::parse("DB.S.STG").unwrap();
        let table_a = ObjectName::parse("DB.S.A").unwrap();
        let table_b = ObjectName::parse("DB.S.B").unwrap();
        let key_a = CheckpointKey::new(Path::new("src.csv"), &stage, &table_a);
        let key_b = CheckpointKey::new(Path::new("src.csv"), &stage, &table_b);

        store.write(&key_a, 10).unwrap();
        assert_eq!(store.read(&key_a), 10);
        assert_eq!(store.read(&key_b), 0);
    }
}
