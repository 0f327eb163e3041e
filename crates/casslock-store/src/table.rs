//! Lock table store traits

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use casslock_common::ConsistencyLevel;

use crate::error::StoreResult;
use crate::predicate::{CellRangePredicate, LockTableOptions};
use crate::value::CellValue;

/// Cell operations on one table
///
/// Implementations must never answer from a client-side cache: the lock
/// polls these methods and a stale answer means deadlock or two holders.
#[async_trait]
pub trait LockTableStore: Send + Sync {
    /// Name of the table
    fn name(&self) -> &str;

    /// Whether the row holds at least one live cell
    async fn row_exists(&self, row: &[u8], consistency: ConsistencyLevel) -> StoreResult<bool>;

    async fn cell_exists(
        &self,
        row: &[u8],
        cell: &[u8],
        consistency: ConsistencyLevel,
    ) -> StoreResult<bool>;

    /// Value of a cell, `None` when missing or expired
    async fn read_cell(
        &self,
        row: &[u8],
        cell: &[u8],
        consistency: ConsistencyLevel,
    ) -> StoreResult<Option<CellValue>>;

    /// Write a cell; `ttl = None` keeps it until dropped
    async fn write_cell(
        &self,
        row: &[u8],
        cell: &[u8],
        value: CellValue,
        ttl: Option<Duration>,
        consistency: ConsistencyLevel,
    ) -> StoreResult<()>;

    /// Delete a cell; deleting a missing cell succeeds
    async fn drop_cell(
        &self,
        row: &[u8],
        cell: &[u8],
        consistency: ConsistencyLevel,
    ) -> StoreResult<()>;

    async fn count_cells(&self, row: &[u8], consistency: ConsistencyLevel) -> StoreResult<usize>;

    /// Cells of a row within the predicate bounds, ascending by raw key bytes
    async fn read_cell_range(
        &self,
        row: &[u8],
        predicate: &CellRangePredicate,
    ) -> StoreResult<Vec<(Vec<u8>, CellValue)>>;
}

/// Keyspace level access to lock tables
#[async_trait]
pub trait LockStore: Send + Sync {
    async fn find_table(&self, name: &str) -> StoreResult<Option<Arc<dyn LockTableStore>>>;

    /// Create the table if missing and return it
    async fn create_table(
        &self,
        name: &str,
        options: &LockTableOptions,
    ) -> StoreResult<Arc<dyn LockTableStore>>;
}
