//! Casslock Store - the lock table capability
//!
//! The bakery lock only needs a handful of cell operations on a single
//! table: existence checks, reads, writes with a TTL, deletes, counts and
//! ordered range reads. This crate defines them as two async traits:
//!
//! - [`LockStore`]: keyspace level, finds or creates the lock table
//! - [`LockTableStore`]: table level, the cell operations themselves
//!
//! plus [`MemoryKeyspace`], an in-process implementation honoring TTLs,
//! used by tests, benchmarks and the command line tool, which keeps it
//! between runs as a [`KeyspaceSnapshot`].

pub mod error;
pub mod memory;
pub mod predicate;
pub mod snapshot;
pub mod table;
pub mod value;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryKeyspace, MemoryLockTable, TableStats};
pub use predicate::{CellRangePredicate, CompactionStrategy, LockTableOptions};
pub use snapshot::{CellSnapshot, KeyspaceSnapshot, RowSnapshot, TableSnapshot};
pub use table::{LockStore, LockTableStore};
pub use value::CellValue;
