//! Command line model
//!
//! - `config` - Arguments and their mapping onto `LockSettings`

pub mod config;

pub use config::{Cli, Command, HostsArgs, StressArgs};
