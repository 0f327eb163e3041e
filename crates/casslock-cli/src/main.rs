//! Entry point of the `casslock` tool.
//!
//! The tool works against an in-process keyspace. With `--store` the
//! keyspace is loaded from a JSON snapshot at startup and saved back once
//! the command succeeds, so host registrations outlive a single run.

use std::sync::Arc;
use std::time::Duration;

use casslock_cli::command;
use casslock_cli::model::{Cli, Command};
use casslock_cli::startup::{LoggingConfig, init_logging};
use casslock_store::{LockStore, MemoryKeyspace};
use clap::Parser;
use tracing::info;

/// How often expired cells are swept from the keyspace
const CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _logging_guard = init_logging(&LoggingConfig::from_env())?;
    casslock_core::metrics::describe_metrics();

    let settings = cli.settings()?;
    info!(
        host = %settings.host_name,
        table = %settings.lock_table_name,
        consistency = %settings.consistency,
        "casslock starting"
    );

    let keyspace = match &cli.store {
        Some(path) => MemoryKeyspace::open(path)?,
        None => MemoryKeyspace::default(),
    };
    let keyspace = Arc::new(keyspace.with_cleanup(CLEANUP_INTERVAL));
    let store: Arc<dyn LockStore> = keyspace.clone();

    match &cli.command {
        Command::Hosts(args) => {
            let outcome = command::hosts::run(store, settings, args).await?;
            let list = args.list || (args.add.is_empty() && args.remove.is_empty());
            print!("{}", outcome.render(list));
        }
        Command::Stress(args) => {
            let report = command::stress::run(store, settings, args).await?;
            println!("{report}");
        }
    }

    if let Some(path) = &cli.store {
        keyspace.save(path)?;
        info!(path = %path.display(), "Keyspace saved");
    }

    Ok(())
}
