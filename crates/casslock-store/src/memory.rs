//! In-memory lock table store
//!
//! Rows and cells live in ordered maps so range reads come back in raw key
//! order, the same guarantee a Cassandra partition gives. Expired cells are
//! hidden from every read and removed by `purge_expired()` or by the
//! optional background sweeper. A keyspace can be saved to and reopened
//! from a JSON snapshot so several runs of a tool share the same tables.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::path::Path;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use casslock_common::ConsistencyLevel;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::time::{Instant, interval};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::predicate::{CellRangePredicate, LockTableOptions};
use crate::snapshot::{
    CellSnapshot, KeyspaceSnapshot, RowSnapshot, TableSnapshot, since_epoch, to_millis,
};
use crate::table::{LockStore, LockTableStore};
use crate::value::CellValue;

struct StoredCell {
    value: CellValue,
    expires_at: Option<Instant>,
}

impl StoredCell {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

type Row = BTreeMap<Vec<u8>, StoredCell>;

/// Operation counters of one table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub reads: u64,
    pub writes: u64,
    pub drops: u64,
}

impl TableStats {
    /// Writes plus drops
    pub fn mutations(&self) -> u64 {
        self.writes + self.drops
    }
}

#[derive(Default)]
struct TableStatsCollector {
    reads: AtomicU64,
    writes: AtomicU64,
    drops: AtomicU64,
}

/// One in-memory table
pub struct MemoryLockTable {
    name: String,
    options: LockTableOptions,
    rows: RwLock<BTreeMap<Vec<u8>, Row>>,
    available: Arc<AtomicBool>,
    stats: TableStatsCollector,
}

impl MemoryLockTable {
    fn new(name: &str, options: LockTableOptions, available: Arc<AtomicBool>) -> Self {
        Self {
            name: name.to_string(),
            options,
            rows: RwLock::new(BTreeMap::new()),
            available,
            stats: TableStatsCollector::default(),
        }
    }

    pub fn options(&self) -> &LockTableOptions {
        &self.options
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            reads: self.stats.reads.load(Ordering::Relaxed),
            writes: self.stats.writes.load(Ordering::Relaxed),
            drops: self.stats.drops.load(Ordering::Relaxed),
        }
    }

    /// Remove expired cells and empty rows, returning the number of cells removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut rows = self.rows.write();
        let mut removed = 0;
        for row in rows.values_mut() {
            let before = row.len();
            row.retain(|_, cell| cell.is_live(now));
            removed += before - row.len();
        }
        rows.retain(|_, row| !row.is_empty());
        removed
    }

    /// Live cell keys of a row, for inspection in tests and tools
    pub fn cell_keys(&self, row: &[u8]) -> Vec<Vec<u8>> {
        let now = Instant::now();
        self.rows
            .read()
            .get(row)
            .map(|cells| {
                cells
                    .iter()
                    .filter(|(_, cell)| cell.is_live(now))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Live row keys, in ascending order
    pub fn row_keys(&self) -> Vec<Vec<u8>> {
        let now = Instant::now();
        self.rows
            .read()
            .iter()
            .filter(|(_, cells)| cells.values().any(|cell| cell.is_live(now)))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn check_available(&self, operation: &str) -> StoreResult<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::unavailable(
                operation,
                format!("table '{}' is not reachable", self.name),
            ))
        }
    }

    fn record_read(&self) {
        self.stats.reads.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, now: Instant, wall: SystemTime) -> TableSnapshot {
        let rows = self
            .rows
            .read()
            .iter()
            .filter_map(|(key, cells)| {
                let cells: Vec<CellSnapshot> = cells
                    .iter()
                    .filter(|(_, cell)| cell.is_live(now))
                    .map(|(cell_key, cell)| CellSnapshot {
                        key: cell_key.clone(),
                        value: cell.value.as_bytes().to_vec(),
                        expires_at_ms: cell.expires_at.map(|at| {
                            to_millis(since_epoch(wall) + at.saturating_duration_since(now))
                        }),
                    })
                    .collect();
                (!cells.is_empty()).then(|| RowSnapshot {
                    key: key.clone(),
                    cells,
                })
            })
            .collect();

        TableSnapshot {
            name: self.name.clone(),
            options: self.options.clone(),
            rows,
        }
    }

    fn restore(
        snapshot: TableSnapshot,
        now: Instant,
        wall: SystemTime,
        available: Arc<AtomicBool>,
    ) -> Self {
        let table = Self::new(&snapshot.name, snapshot.options, available);
        let elapsed = since_epoch(wall);
        {
            let mut rows = table.rows.write();
            for row in snapshot.rows {
                let mut cells = Row::new();
                for cell in row.cells {
                    let expires_at = match cell.expires_at_ms {
                        None => None,
                        Some(ms) => match Duration::from_millis(ms).checked_sub(elapsed) {
                            Some(left) if !left.is_zero() => Some(now + left),
                            _ => continue,
                        },
                    };
                    cells.insert(
                        cell.key,
                        StoredCell {
                            value: CellValue::from(cell.value),
                            expires_at,
                        },
                    );
                }
                if !cells.is_empty() {
                    rows.insert(row.key, cells);
                }
            }
        }
        table
    }
}

#[async_trait]
impl LockTableStore for MemoryLockTable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn row_exists(&self, row: &[u8], _consistency: ConsistencyLevel) -> StoreResult<bool> {
        self.check_available("row_exists")?;
        self.record_read();
        let now = Instant::now();
        Ok(self
            .rows
            .read()
            .get(row)
            .is_some_and(|cells| cells.values().any(|cell| cell.is_live(now))))
    }

    async fn cell_exists(
        &self,
        row: &[u8],
        cell: &[u8],
        _consistency: ConsistencyLevel,
    ) -> StoreResult<bool> {
        self.check_available("cell_exists")?;
        self.record_read();
        let now = Instant::now();
        Ok(self
            .rows
            .read()
            .get(row)
            .and_then(|cells| cells.get(cell))
            .is_some_and(|stored| stored.is_live(now)))
    }

    async fn read_cell(
        &self,
        row: &[u8],
        cell: &[u8],
        _consistency: ConsistencyLevel,
    ) -> StoreResult<Option<CellValue>> {
        self.check_available("read_cell")?;
        self.record_read();
        let now = Instant::now();
        Ok(self
            .rows
            .read()
            .get(row)
            .and_then(|cells| cells.get(cell))
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.value.clone()))
    }

    async fn write_cell(
        &self,
        row: &[u8],
        cell: &[u8],
        value: CellValue,
        ttl: Option<Duration>,
        _consistency: ConsistencyLevel,
    ) -> StoreResult<()> {
        self.check_available("write_cell")?;
        if cell.is_empty() {
            return Err(StoreError::InvalidRequest(
                "cell key cannot be empty".to_string(),
            ));
        }
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.rows
            .write()
            .entry(row.to_vec())
            .or_default()
            .insert(cell.to_vec(), StoredCell { value, expires_at });
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn drop_cell(
        &self,
        row: &[u8],
        cell: &[u8],
        _consistency: ConsistencyLevel,
    ) -> StoreResult<()> {
        self.check_available("drop_cell")?;
        let mut rows = self.rows.write();
        if let Some(cells) = rows.get_mut(row) {
            cells.remove(cell);
            if cells.is_empty() {
                rows.remove(row);
            }
        }
        self.stats.drops.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn count_cells(&self, row: &[u8], _consistency: ConsistencyLevel) -> StoreResult<usize> {
        self.check_available("count_cells")?;
        self.record_read();
        let now = Instant::now();
        Ok(self
            .rows
            .read()
            .get(row)
            .map(|cells| cells.values().filter(|cell| cell.is_live(now)).count())
            .unwrap_or(0))
    }

    async fn read_cell_range(
        &self,
        row: &[u8],
        predicate: &CellRangePredicate,
    ) -> StoreResult<Vec<(Vec<u8>, CellValue)>> {
        self.check_available("read_cell_range")?;
        self.record_read();
        let now = Instant::now();
        let rows = self.rows.read();
        let Some(cells) = rows.get(row) else {
            return Ok(Vec::new());
        };
        Ok(cells
            .iter()
            .filter(|(key, cell)| cell.is_live(now) && predicate.contains(key))
            .take(predicate.max_count)
            .map(|(key, cell)| (key.clone(), cell.value.clone()))
            .collect())
    }
}

/// In-memory keyspace holding lock tables
pub struct MemoryKeyspace {
    name: String,
    tables: Arc<DashMap<String, Arc<MemoryLockTable>>>,
    available: Arc<AtomicBool>,
    cleanup_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MemoryKeyspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Arc::new(DashMap::new()),
            available: Arc::new(AtomicBool::new(true)),
            cleanup_handle: Mutex::new(None),
        }
    }

    /// Start a background task purging expired cells every `every`
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_cleanup(self, every: Duration) -> Self {
        let tables = self.tables.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            loop {
                ticker.tick().await;
                let removed: usize = tables.iter().map(|t| t.value().purge_expired()).sum();
                if removed > 0 {
                    debug!(count = removed, "Purged expired lock table cells");
                }
            }
        });
        *self.cleanup_handle.lock() = Some(handle);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Simulate the store going down (`false`) or coming back (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Concrete handle on a table, for inspection
    pub fn table(&self, name: &str) -> Option<Arc<MemoryLockTable>> {
        self.tables.get(name).map(|t| t.value().clone())
    }

    pub fn purge_expired(&self) -> usize {
        self.tables.iter().map(|t| t.value().purge_expired()).sum()
    }

    /// Image of every table and live cell, tables sorted by name
    pub fn snapshot(&self) -> KeyspaceSnapshot {
        let now = Instant::now();
        let wall = SystemTime::now();
        let mut tables: Vec<TableSnapshot> = self
            .tables
            .iter()
            .map(|t| t.value().snapshot(now, wall))
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        KeyspaceSnapshot {
            name: self.name.clone(),
            tables,
        }
    }

    /// Rebuild a keyspace; cells already expired are left out
    pub fn from_snapshot(snapshot: KeyspaceSnapshot) -> Self {
        let keyspace = Self::new(snapshot.name);
        let now = Instant::now();
        let wall = SystemTime::now();
        for table in snapshot.tables {
            let table = MemoryLockTable::restore(table, now, wall, keyspace.available.clone());
            keyspace
                .tables
                .insert(table.name.clone(), Arc::new(table));
        }
        keyspace
    }

    /// Open the keyspace saved at `path`, or an empty one when there is none yet
    pub fn open(path: &Path) -> StoreResult<Self> {
        let keyspace = match KeyspaceSnapshot::read_from(path)? {
            Some(snapshot) => Self::from_snapshot(snapshot),
            None => Self::default(),
        };
        debug!(
            keyspace = %keyspace.name,
            path = %path.display(),
            tables = keyspace.tables.len(),
            "Opened keyspace snapshot"
        );
        Ok(keyspace)
    }

    /// Save every table and live cell to `path`
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        self.snapshot().write_to(path)
    }

    fn check_available(&self, operation: &str) -> StoreResult<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::unavailable(
                operation,
                format!("keyspace '{}' is not reachable", self.name),
            ))
        }
    }
}

impl Default for MemoryKeyspace {
    fn default() -> Self {
        Self::new("casslock")
    }
}

impl Drop for MemoryKeyspace {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup_handle.lock().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl LockStore for MemoryKeyspace {
    async fn find_table(&self, name: &str) -> StoreResult<Option<Arc<dyn LockTableStore>>> {
        self.check_available("find_table")?;
        Ok(self
            .tables
            .get(name)
            .map(|t| t.value().clone() as Arc<dyn LockTableStore>))
    }

    async fn create_table(
        &self,
        name: &str,
        options: &LockTableOptions,
    ) -> StoreResult<Arc<dyn LockTableStore>> {
        self.check_available("create_table")?;
        if name.is_empty() {
            return Err(StoreError::InvalidRequest(
                "table name cannot be empty".to_string(),
            ));
        }
        let table = self
            .tables
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(keyspace = %self.name, table = %name, "Creating lock table");
                Arc::new(MemoryLockTable::new(
                    name,
                    options.clone(),
                    self.available.clone(),
                ))
            })
            .value()
            .clone();
        Ok(table)
    }
}
