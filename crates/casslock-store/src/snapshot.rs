//! Keyspace snapshots
//!
//! A [`KeyspaceSnapshot`] is the JSON image of a [`MemoryKeyspace`]: its
//! tables, their options and every live cell. Expiry is stored as wall clock
//! milliseconds since the Unix epoch so a cell keeps the rest of its TTL
//! when the snapshot is loaded by another process.
//!
//! [`MemoryKeyspace`]: crate::MemoryKeyspace

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::predicate::LockTableOptions;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceSnapshot {
    pub name: String,
    pub tables: Vec<TableSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,
    pub options: LockTableOptions,
    pub rows: Vec<RowSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSnapshot {
    pub key: Vec<u8>,
    pub cells: Vec<CellSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Expiry in milliseconds since the Unix epoch, absent for cells without TTL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
}

impl KeyspaceSnapshot {
    /// Read a snapshot file; `None` when the file does not exist yet
    pub fn read_from(path: &Path) -> StoreResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read(path).map_err(|e| StoreError::snapshot(path, e))?;
        let snapshot = serde_json::from_slice(&content).map_err(|e| StoreError::snapshot(path, e))?;
        Ok(Some(snapshot))
    }

    /// Write the snapshot, replacing the file only once the new content is complete
    pub fn write_to(&self, path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::snapshot(path, e))?;
        }
        let content = serde_json::to_vec_pretty(self).map_err(|e| StoreError::snapshot(path, e))?;
        let staging = path.with_extension("tmp");
        fs::write(&staging, content).map_err(|e| StoreError::snapshot(path, e))?;
        fs::rename(&staging, path).map_err(|e| StoreError::snapshot(path, e))?;
        Ok(())
    }
}

pub(crate) fn since_epoch(wall: SystemTime) -> Duration {
    wall.duration_since(UNIX_EPOCH).unwrap_or_default()
}

pub(crate) fn to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KeyspaceSnapshot {
        KeyspaceSnapshot {
            name: "casslock".to_string(),
            tables: vec![TableSnapshot {
                name: "lock_table".to_string(),
                options: LockTableOptions::default(),
                rows: vec![RowSnapshot {
                    key: b"hosts".to_vec(),
                    cells: vec![CellSnapshot {
                        key: b"web1".to_vec(),
                        value: vec![0, 0, 0, 1],
                        expires_at_ms: None,
                    }],
                }],
            }],
        }
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyspace.json");
        assert_eq!(KeyspaceSnapshot::read_from(&path).unwrap(), None);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("keyspace.json");

        sample().write_to(&path).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(KeyspaceSnapshot::read_from(&path).unwrap(), Some(sample()));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyspace.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = KeyspaceSnapshot::read_from(&path).unwrap_err();
        assert!(matches!(err, StoreError::Snapshot { .. }));
    }
}
