//! Casslock Core - Distributed bakery lock
//!
//! This crate implements the lock itself on top of `casslock-store`:
//! - Ticket and entering-set key encoding (`ticket`)
//! - Host registry bootstrap (`hosts`)
//! - Per-process lock context (`context`)
//! - The bakery lock state machine (`bakery`)
//! - A multi-process stress scenario (`stress`)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use casslock_common::LockSettings;
//! use casslock_core::LockContext;
//! use casslock_store::MemoryKeyspace;
//!
//! # async fn demo() -> casslock_common::Result<()> {
//! let store = Arc::new(MemoryKeyspace::default());
//! let context = LockContext::new(store, LockSettings::default().with_host_name("web1"))?;
//! context.add_lock_host("web1").await?;
//!
//! let lock = context.lock("users::alice").await?;
//! assert!(lock.is_locked());
//! # Ok(())
//! # }
//! ```

pub mod bakery;
pub mod context;
pub mod hosts;
pub mod identity;
pub mod metrics;
pub mod stress;
pub mod ticket;

// Re-exports for convenience
pub use bakery::{BakeryLock, LockPhase};
pub use context::LockContext;
pub use hosts::{HostRegistry, LockHost};
pub use identity::ProcessIdentity;
pub use stress::{StressConfig, StressReport, run_stress};
pub use ticket::{EnteringKey, TicketKey};
