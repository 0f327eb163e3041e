//! Command line arguments for the `casslock` binary
//!
//! Lock settings come from three layers: an optional YAML file, `CASSLOCK_*`
//! environment variables, and the flags below, each overriding the previous.

use std::path::PathBuf;

use casslock_common::{ConsistencyLevel, LockSettings};
use casslock_core::StressConfig;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "casslock", version, about = "Distributed bakery lock tool")]
pub struct Cli {
    /// Settings file (YAML, TOML or JSON)
    #[arg(short = 'c', long = "config", env = "CASSLOCK_CONFIG")]
    pub config: Option<PathBuf>,
    /// Name of this computer in the host registry
    #[arg(long = "host-name")]
    pub host_name: Option<String>,
    /// Name of the lock table
    #[arg(long = "lock-table")]
    pub lock_table: Option<String>,
    /// Lock acquisition timeout in seconds
    #[arg(short = 't', long = "timeout")]
    pub timeout: Option<u32>,
    /// Ticket TTL in seconds, 0 disables expiry
    #[arg(long = "ttl")]
    pub ttl: Option<u32>,
    /// Consistency level of every lock read and write
    #[arg(long = "consistency")]
    pub consistency: Option<ConsistencyLevel>,
    /// Keyspace snapshot shared between runs; without it every run starts empty
    #[arg(short = 's', long = "store", env = "CASSLOCK_STORE")]
    pub store: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add, remove and list lock hosts
    Hosts(HostsArgs),
    /// Race simulated processes for the same rows and look for double winners
    Stress(StressArgs),
}

#[derive(Debug, Clone, Args)]
pub struct HostsArgs {
    /// Register a host (repeatable)
    #[arg(short = 'a', long = "add")]
    pub add: Vec<String>,
    /// Remove a host (repeatable)
    #[arg(short = 'r', long = "remove")]
    pub remove: Vec<String>,
    /// Print the registered hosts
    #[arg(short = 'l', long = "list")]
    pub list: bool,
}

#[derive(Debug, Clone, Args)]
pub struct StressArgs {
    /// Number of simulated processes
    #[arg(short = 'i', long = "instances", default_value_t = 4)]
    pub processes: usize,
    /// Rows each process competes for
    #[arg(short = 'n', long = "repeat", default_value_t = 10)]
    pub repeat: usize,
    /// Hosts to spread the processes over, comma separated
    #[arg(long = "hosts", value_delimiter = ',')]
    pub hosts: Vec<String>,
    /// Table receiving winner and loser cells
    #[arg(long = "data-table", default_value = "lock_test")]
    pub data_table: String,
    /// Upper bound of the random pause between rounds, in milliseconds
    #[arg(long = "max-pause-ms", default_value_t = 20)]
    pub max_pause_ms: u64,
}

impl StressArgs {
    pub fn to_config(&self) -> StressConfig {
        StressConfig {
            processes: self.processes,
            repeat: self.repeat,
            hosts: self.hosts.clone(),
            data_table: self.data_table.clone(),
            max_pause_ms: self.max_pause_ms,
        }
    }
}

impl Cli {
    /// Resolve the lock settings, flags winning over file and environment
    pub fn settings(&self) -> anyhow::Result<LockSettings> {
        let mut builder = LockSettings::builder(self.config.as_deref());

        if let Some(v) = &self.host_name {
            builder = builder.set_override("host_name", v.as_str())?;
        }
        if let Some(v) = &self.lock_table {
            builder = builder.set_override("lock_table_name", v.as_str())?;
        }
        if let Some(v) = self.timeout {
            builder = builder.set_override("lock_timeout_secs", i64::from(v))?;
        }
        if let Some(v) = self.ttl {
            builder = builder.set_override("lock_ttl_secs", i64::from(v))?;
        }
        if let Some(v) = self.consistency {
            builder = builder.set_override("consistency", v.as_str())?;
        }

        Ok(LockSettings::from_config(builder.build()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_stress() {
        let cli = Cli::try_parse_from([
            "casslock",
            "--host-name",
            "web1",
            "stress",
            "-i",
            "8",
            "-n",
            "3",
            "--hosts",
            "a,b",
        ])
        .unwrap();

        let Command::Stress(args) = &cli.command else {
            panic!("expected stress command");
        };
        let config = args.to_config();
        assert_eq!(config.processes, 8);
        assert_eq!(config.repeat, 3);
        assert_eq!(config.hosts, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(config.data_table, "lock_test");
    }

    #[test]
    fn test_parse_hosts() {
        let cli = Cli::try_parse_from([
            "casslock", "--store", "/tmp/casslock.json", "hosts", "-a", "web1", "-a", "web2", "-r",
            "old", "-l",
        ])
        .unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/casslock.json")));
        let Command::Hosts(args) = &cli.command else {
            panic!("expected hosts command");
        };
        assert_eq!(args.add, vec!["web1".to_string(), "web2".to_string()]);
        assert_eq!(args.remove, vec!["old".to_string()]);
        assert!(args.list);
    }

    #[test]
    fn test_invalid_consistency_rejected() {
        let result = Cli::try_parse_from(["casslock", "--consistency", "sometimes", "hosts"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("casslock.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "host_name: from-file").unwrap();
        writeln!(file, "lock_table_name: file_locks").unwrap();
        writeln!(file, "lock_timeout_secs: 7").unwrap();
        drop(file);

        let cli = Cli::try_parse_from([
            "casslock",
            "--config",
            path.to_str().unwrap(),
            "--host-name",
            "from-flag",
            "--ttl",
            "0",
            "--consistency",
            "all",
            "hosts",
        ])
        .unwrap();

        let settings = cli.settings().unwrap();
        assert_eq!(settings.host_name, "from-flag");
        assert_eq!(settings.lock_table_name, "file_locks");
        assert_eq!(settings.lock_timeout_secs, 7);
        assert_eq!(settings.lock_ttl_secs, 0);
        assert_eq!(settings.consistency, ConsistencyLevel::All);
    }
}
