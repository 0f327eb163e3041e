//! Request parameter structs

use casslock_common::ConsistencyLevel;
use serde::{Deserialize, Serialize};

/// Range of cells to read from one row
///
/// Both bounds are inclusive and compared as raw bytes. Results come back in
/// ascending key order, at most `max_count` of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRangePredicate {
    pub start_key: Option<Vec<u8>>,
    pub end_key: Option<Vec<u8>>,
    pub max_count: usize,
    pub consistency: ConsistencyLevel,
}

impl Default for CellRangePredicate {
    fn default() -> Self {
        Self {
            start_key: None,
            end_key: None,
            max_count: 100,
            consistency: ConsistencyLevel::default(),
        }
    }
}

impl CellRangePredicate {
    /// Every cell of the row, up to `max_count`
    pub fn all(max_count: usize, consistency: ConsistencyLevel) -> Self {
        Self {
            max_count,
            consistency,
            ..Default::default()
        }
    }

    pub fn with_end_key(mut self, end_key: impl Into<Vec<u8>>) -> Self {
        self.end_key = Some(end_key.into());
        self
    }

    pub fn with_start_key(mut self, start_key: impl Into<Vec<u8>>) -> Self {
        self.start_key = Some(start_key.into());
        self
    }

    /// Whether `key` falls within the bounds
    pub fn contains(&self, key: &[u8]) -> bool {
        if let Some(start) = &self.start_key
            && key < start.as_slice()
        {
            return false;
        }
        if let Some(end) = &self.end_key
            && key > end.as_slice()
        {
            return false;
        }
        true
    }
}

/// Compaction strategy of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class")]
pub enum CompactionStrategy {
    SizeTiered { min_threshold: u32, max_threshold: u32 },
    Leveled,
}

/// Schema parameters used when the lock table gets created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTableOptions {
    pub gc_grace_seconds: u32,
    pub memtable_flush_period_ms: u64,
    pub compaction: CompactionStrategy,
    /// Key cache setting ("ALL" or "NONE")
    pub caching_keys: String,
    /// Row cache setting per partition
    pub caching_rows_per_partition: String,
}

impl Default for LockTableOptions {
    fn default() -> Self {
        Self {
            gc_grace_seconds: 3600,
            memtable_flush_period_ms: 3_600_000, // 1 hour
            compaction: CompactionStrategy::SizeTiered {
                min_threshold: 4,
                max_threshold: 22,
            },
            caching_keys: "ALL".to_string(),
            caching_rows_per_partition: "NONE".to_string(),
        }
    }
}
