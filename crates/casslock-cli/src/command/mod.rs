//! Subcommands of the `casslock` binary

pub mod hosts;
pub mod stress;
