//! Lock settings
//!
//! Settings are shared by every cooperating process: the lock table name,
//! the timeout, the TTL and the consistency level must be identical across
//! the cluster, only `host_name` differs from one computer to the next.

use std::path::Path;
use std::time::Duration;

use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::consistency::ConsistencyLevel;
use crate::error::{CassLockError, Result};
use crate::{
    DEFAULT_LOCK_TABLE_NAME, DEFAULT_LOCK_TIMEOUT_SECS, DEFAULT_LOCK_TTL_SECS,
    DEFAULT_POLL_INTERVAL_MS, ENTERING_TTL_MARGIN_SECS,
};

/// Environment variable prefix (`CASSLOCK_LOCK_TIMEOUT_SECS=10`, ...)
pub const ENV_PREFIX: &str = "CASSLOCK";

/// Per-context lock configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Table holding hosts, entering sets and ticket sets
    pub lock_table_name: String,
    /// Name of this computer in the host registry
    pub host_name: String,
    /// Maximum time `lock()` waits, in seconds (at least 1)
    pub lock_timeout_secs: u32,
    /// TTL of ticket cells in seconds, 0 disables expiry
    pub lock_ttl_secs: u32,
    /// Consistency level of every read and write the lock issues
    pub consistency: ConsistencyLevel,
    /// Sleep between two polls while waiting, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            lock_table_name: DEFAULT_LOCK_TABLE_NAME.to_string(),
            host_name: local_host_name(),
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            consistency: ConsistencyLevel::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl LockSettings {
    /// Load settings from an optional file and `CASSLOCK_*` environment variables.
    ///
    /// Environment variables win over the file; missing keys keep their defaults.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config = Self::builder(file)
            .build()
            .map_err(|e| CassLockError::Configuration(e.to_string()))?;
        Self::from_config(config)
    }

    /// Configuration sources behind `load`, open for further overrides
    pub fn builder(file: Option<&Path>) -> ConfigBuilder<DefaultState> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Deserialize and validate settings from a built configuration
    pub fn from_config(config: Config) -> Result<Self> {
        let settings: LockSettings = config
            .try_deserialize()
            .map_err(|e| CassLockError::Configuration(e.to_string()))?;
        settings.validated()
    }

    /// Apply the bounds the lock relies on
    pub fn validated(mut self) -> Result<Self> {
        if self.lock_table_name.is_empty() {
            return Err(CassLockError::Configuration(
                "the lock table name cannot be empty".to_string(),
            ));
        }
        if self.host_name.is_empty() {
            return Err(CassLockError::Configuration(
                "the host name cannot be empty".to_string(),
            ));
        }
        if self.lock_timeout_secs < 1 {
            self.lock_timeout_secs = 1;
        }
        if self.poll_interval_ms == 0 {
            self.poll_interval_ms = DEFAULT_POLL_INTERVAL_MS;
        }
        Ok(self)
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    pub fn with_lock_table_name(mut self, name: impl Into<String>) -> Self {
        self.lock_table_name = name.into();
        self
    }

    pub fn with_lock_timeout_secs(mut self, secs: u32) -> Self {
        self.lock_timeout_secs = secs.max(1);
        self
    }

    pub fn with_lock_ttl_secs(mut self, secs: u32) -> Self {
        self.lock_ttl_secs = secs;
        self
    }

    pub fn with_consistency(mut self, consistency: ConsistencyLevel) -> Self {
        self.consistency = consistency;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms.max(1);
        self
    }

    /// Get the acquisition timeout as Duration
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.lock_timeout_secs.max(1)))
    }

    /// TTL of ticket cells; `None` when expiry is disabled
    pub fn ticket_ttl(&self) -> Option<Duration> {
        match self.lock_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }

    /// TTL of the entering sentinel: the timeout plus a small margin
    pub fn entering_ttl(&self) -> Duration {
        Duration::from_secs(
            u64::from(self.lock_timeout_secs.max(1)) + u64::from(ENTERING_TTL_MARGIN_SECS),
        )
    }

    /// Get the poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Name of the machine, used as the default host name
pub fn local_host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = LockSettings::default();
        assert_eq!(settings.lock_table_name, "lock_table");
        assert_eq!(settings.lock_timeout_secs, 5);
        assert_eq!(settings.lock_ttl_secs, 60);
        assert_eq!(settings.consistency, ConsistencyLevel::Quorum);
        assert_eq!(settings.poll_interval(), Duration::from_millis(100));
        assert!(!settings.host_name.is_empty());
    }

    #[test]
    fn test_durations() {
        let settings = LockSettings::default()
            .with_lock_timeout_secs(3)
            .with_lock_ttl_secs(0);
        assert_eq!(settings.lock_timeout(), Duration::from_secs(3));
        assert_eq!(settings.entering_ttl(), Duration::from_secs(8));
        assert_eq!(settings.ticket_ttl(), None);

        let settings = settings.with_lock_ttl_secs(30);
        assert_eq!(settings.ticket_ttl(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_entering_ttl_with_largest_timeout() {
        let settings = LockSettings::default().with_lock_timeout_secs(u32::MAX);
        assert_eq!(
            settings.entering_ttl(),
            Duration::from_secs(u64::from(u32::MAX) + u64::from(ENTERING_TTL_MARGIN_SECS))
        );
        assert!(settings.entering_ttl() > settings.lock_timeout());
    }

    #[test]
    fn test_timeout_is_clamped() {
        let settings = LockSettings::default().with_lock_timeout_secs(0);
        assert_eq!(settings.lock_timeout_secs, 1);

        let settings = LockSettings {
            lock_timeout_secs: 0,
            ..Default::default()
        }
        .validated()
        .unwrap();
        assert_eq!(settings.lock_timeout_secs, 1);
    }

    #[test]
    fn test_empty_names_rejected() {
        let result = LockSettings::default().with_host_name("").validated();
        assert!(matches!(result, Err(CassLockError::Configuration(_))));

        let result = LockSettings::default().with_lock_table_name("").validated();
        assert!(matches!(result, Err(CassLockError::Configuration(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("casslock.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "lock_table_name: app_locks").unwrap();
        writeln!(file, "host_name: web7").unwrap();
        writeln!(file, "lock_timeout_secs: 9").unwrap();
        writeln!(file, "consistency: local-quorum").unwrap();
        drop(file);

        let settings = LockSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.lock_table_name, "app_locks");
        assert_eq!(settings.host_name, "web7");
        assert_eq!(settings.lock_timeout_secs, 9);
        assert_eq!(settings.lock_ttl_secs, 60);
        assert_eq!(settings.consistency, ConsistencyLevel::LocalQuorum);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = LockSettings::load(Some(Path::new("/nonexistent/casslock.yml")));
        assert!(matches!(result, Err(CassLockError::Configuration(_))));
    }

    #[test]
    fn test_builder_override_wins() {
        let config = LockSettings::builder(None)
            .set_override("host_name", "override-host")
            .unwrap()
            .set_override("lock_ttl_secs", 0)
            .unwrap()
            .build()
            .unwrap();
        let settings = LockSettings::from_config(config).unwrap();
        assert_eq!(settings.host_name, "override-host");
        assert_eq!(settings.ticket_ttl(), None);
    }

    #[test]
    fn test_serde_round_trip() {
        let settings = LockSettings::default().with_host_name("db3");
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"consistency\":\"quorum\""));
        let back: LockSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
