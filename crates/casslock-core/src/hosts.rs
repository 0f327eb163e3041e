//! Host registry
//!
//! The `hosts` row of the lock table maps each computer name to a small
//! integer used as the second field of every ticket. Identifiers are handed
//! out by `add`, which is not protected by any lock: only one process may
//! run it at a time, typically an administrator bootstrapping the cluster.

use std::collections::BTreeSet;
use std::sync::Arc;

use casslock_common::{
    CassLockError, ConsistencyLevel, HOSTS_ROW, LARGEST_HOST_ID, NULL_HOST_ID, Result,
};
use casslock_store::{CellRangePredicate, CellValue, LockTableStore};
use tracing::{info, warn};

/// One registered host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHost {
    pub name: String,
    pub id: u32,
}

/// Reads and edits the `hosts` row of a lock table
pub struct HostRegistry {
    table: Arc<dyn LockTableStore>,
    consistency: ConsistencyLevel,
}

impl HostRegistry {
    pub fn new(table: Arc<dyn LockTableStore>, consistency: ConsistencyLevel) -> Self {
        Self { table, consistency }
    }

    /// Identifier of `host_name`, `None` when not registered
    pub async fn lookup(&self, host_name: &str) -> Result<Option<u32>> {
        let value = self
            .table
            .read_cell(HOSTS_ROW.as_bytes(), host_name.as_bytes(), self.consistency)
            .await?;
        Ok(value
            .and_then(|v| v.as_u32())
            .filter(|id| *id != NULL_HOST_ID))
    }

    /// Identifier of `host_name`, or a configuration error if the host was
    /// never added
    pub async fn host_id(&self, host_name: &str) -> Result<u32> {
        if !self
            .table
            .row_exists(HOSTS_ROW.as_bytes(), self.consistency)
            .await?
        {
            return Err(CassLockError::Configuration(format!(
                "the hosts row of lock table '{}' does not exist; add this computer (\"{}\") with add_lock_host() before using a lock",
                self.table.name(),
                host_name
            )));
        }

        self.lookup(host_name).await?.ok_or_else(|| {
            CassLockError::Configuration(format!(
                "host \"{}\" is not defined in lock table '{}'",
                host_name,
                self.table.name()
            ))
        })
    }

    /// All registered hosts, sorted by identifier
    pub async fn list(&self) -> Result<Vec<LockHost>> {
        let count = self
            .table
            .count_cells(HOSTS_ROW.as_bytes(), self.consistency)
            .await?;
        let cells = self
            .table
            .read_cell_range(
                HOSTS_ROW.as_bytes(),
                &CellRangePredicate::all(count + 100, self.consistency),
            )
            .await?;

        let mut hosts = Vec::with_capacity(cells.len());
        for (key, value) in cells {
            let name = String::from_utf8_lossy(&key).into_owned();
            match value.as_u32() {
                Some(id) if id != NULL_HOST_ID => hosts.push(LockHost { name, id }),
                _ => warn!(host = %name, "Ignoring host entry without a valid identifier"),
            }
        }
        hosts.sort_by_key(|h| h.id);
        Ok(hosts)
    }

    /// Register `host_name` with the lowest free identifier
    ///
    /// Returns the existing identifier if the host is already registered.
    pub async fn add(&self, host_name: &str) -> Result<u32> {
        if host_name.is_empty() {
            return Err(CassLockError::IllegalArgument(
                "host name cannot be empty".to_string(),
            ));
        }

        let hosts = self.list().await?;
        if let Some(existing) = hosts.iter().find(|h| h.name == host_name) {
            return Ok(existing.id);
        }

        let used: BTreeSet<u32> = hosts.iter().map(|h| h.id).collect();
        let id = (1..=LARGEST_HOST_ID)
            .find(|id| !used.contains(id))
            .ok_or_else(|| CassLockError::HostIdExhausted {
                host_name: host_name.to_string(),
            })?;

        self.table
            .write_cell(
                HOSTS_ROW.as_bytes(),
                host_name.as_bytes(),
                CellValue::from_u32(id),
                None,
                self.consistency,
            )
            .await?;

        info!(host = %host_name, host_id = id, table = %self.table.name(), "Registered lock host");
        Ok(id)
    }

    /// Remove `host_name`, returning whether it was registered
    pub async fn remove(&self, host_name: &str) -> Result<bool> {
        let existed = self
            .table
            .cell_exists(HOSTS_ROW.as_bytes(), host_name.as_bytes(), self.consistency)
            .await?;
        if existed {
            self.table
                .drop_cell(HOSTS_ROW.as_bytes(), host_name.as_bytes(), self.consistency)
                .await?;
            info!(host = %host_name, table = %self.table.name(), "Removed lock host");
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casslock_store::{LockStore, LockTableOptions, MemoryKeyspace};

    const CL: ConsistencyLevel = ConsistencyLevel::Quorum;

    async fn registry() -> (MemoryKeyspace, HostRegistry) {
        let keyspace = MemoryKeyspace::default();
        let table = keyspace
            .create_table("lock_table", &LockTableOptions::default())
            .await
            .unwrap();
        (keyspace, HostRegistry::new(table, CL))
    }

    #[tokio::test]
    async fn test_add_assigns_sequential_ids() {
        let (_keyspace, registry) = registry().await;
        assert_eq!(registry.add("alpha").await.unwrap(), 1);
        assert_eq!(registry.add("beta").await.unwrap(), 2);
        assert_eq!(registry.add("gamma").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let (keyspace, registry) = registry().await;
        assert_eq!(registry.add("alpha").await.unwrap(), 1);
        let writes = keyspace.table("lock_table").unwrap().stats().writes;

        assert_eq!(registry.add("alpha").await.unwrap(), 1);
        assert_eq!(keyspace.table("lock_table").unwrap().stats().writes, writes);
    }

    #[tokio::test]
    async fn test_removed_id_is_reused() {
        let (_keyspace, registry) = registry().await;
        registry.add("alpha").await.unwrap();
        registry.add("beta").await.unwrap();
        registry.add("gamma").await.unwrap();

        assert!(registry.remove("beta").await.unwrap());
        assert!(!registry.remove("beta").await.unwrap());
        assert_eq!(registry.lookup("beta").await.unwrap(), None);

        assert_eq!(registry.add("delta").await.unwrap(), 2);
        assert_eq!(registry.add("epsilon").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_list_sorted_by_id() {
        let (_keyspace, registry) = registry().await;
        registry.add("zulu").await.unwrap();
        registry.add("alpha").await.unwrap();

        let hosts = registry.list().await.unwrap();
        assert_eq!(
            hosts,
            vec![
                LockHost {
                    name: "zulu".to_string(),
                    id: 1
                },
                LockHost {
                    name: "alpha".to_string(),
                    id: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_host_id_errors() {
        let (_keyspace, registry) = registry().await;

        // No hosts row at all
        let err = registry.host_id("alpha").await.unwrap_err();
        assert!(err.is_configuration());

        // Row exists but this host is missing
        registry.add("beta").await.unwrap();
        let err = registry.host_id("alpha").await.unwrap_err();
        assert!(err.is_configuration());

        assert_eq!(registry.host_id("beta").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let (_keyspace, registry) = registry().await;
        assert!(matches!(
            registry.add("").await,
            Err(CassLockError::IllegalArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_exhaustion() {
        let (keyspace, registry) = registry().await;
        let table = keyspace.table("lock_table").unwrap();
        for id in 1..=LARGEST_HOST_ID {
            table
                .write_cell(
                    HOSTS_ROW.as_bytes(),
                    format!("host-{id:05}").as_bytes(),
                    CellValue::from_u32(id),
                    None,
                    CL,
                )
                .await
                .unwrap();
        }

        let err = registry.add("one-too-many").await.unwrap_err();
        assert!(matches!(err, CassLockError::HostIdExhausted { .. }));
    }
}
