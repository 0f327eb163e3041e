//! Casslock Common - Shared types and settings
//!
//! This crate provides the foundational types used across all casslock components:
//! - Error taxonomy (`CassLockError`)
//! - Consistency levels understood by the lock table store
//! - Lock settings loaded from file, environment, or code
//! - Common constants (row names, host identifier bounds)

pub mod consistency;
pub mod error;
pub mod settings;

// Re-exports for convenience
pub use consistency::ConsistencyLevel;
pub use error::{CassLockError, Result};
pub use settings::LockSettings;

/// Row of the lock table holding the host name -> host identifier registry
pub const HOSTS_ROW: &str = "hosts";

/// Row prefix of the per-resource entering set
pub const ENTERING_ROW_PREFIX: &str = "entering::";

/// Row prefix of the per-resource ticket set
pub const TICKETS_ROW_PREFIX: &str = "tickets::";

/// Host identifier meaning "not registered"; never assigned
pub const NULL_HOST_ID: u32 = 0;

/// Largest host identifier `add_lock_host` will hand out
pub const LARGEST_HOST_ID: u32 = 10_000;

/// Default name of the lock table
pub const DEFAULT_LOCK_TABLE_NAME: &str = "lock_table";

/// Default acquisition timeout in seconds
pub const DEFAULT_LOCK_TIMEOUT_SECS: u32 = 5;

/// Default time-to-live of ticket cells in seconds
pub const DEFAULT_LOCK_TTL_SECS: u32 = 60;

/// Default sleep between two polls of the lock table
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Extra seconds added to the lock timeout for the entering sentinel TTL
pub const ENTERING_TTL_MARGIN_SECS: u32 = 5;

/// Build the entering-set row key for a resource
pub fn entering_row(resource: &[u8]) -> Vec<u8> {
    let mut row = Vec::with_capacity(ENTERING_ROW_PREFIX.len() + resource.len());
    row.extend_from_slice(ENTERING_ROW_PREFIX.as_bytes());
    row.extend_from_slice(resource);
    row
}

/// Build the ticket-set row key for a resource
pub fn tickets_row(resource: &[u8]) -> Vec<u8> {
    let mut row = Vec::with_capacity(TICKETS_ROW_PREFIX.len() + resource.len());
    row.extend_from_slice(TICKETS_ROW_PREFIX.as_bytes());
    row.extend_from_slice(resource);
    row
}
