//! `casslock hosts`: edit and print the host registry

use std::sync::Arc;

use casslock_common::LockSettings;
use casslock_core::{LockContext, LockHost};
use casslock_store::LockStore;
use tracing::info;

use crate::model::HostsArgs;

/// What a `hosts` run changed, and the registry it left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostsOutcome {
    pub added: Vec<LockHost>,
    /// Hosts given to `--remove`, with whether they were registered
    pub removed: Vec<(String, bool)>,
    pub hosts: Vec<LockHost>,
}

impl HostsOutcome {
    /// One line per change, then the registry when `list` is set
    pub fn render(&self, list: bool) -> String {
        let mut out = String::new();
        for (name, was_registered) in &self.removed {
            if *was_registered {
                out.push_str(&format!("removed {}\n", name));
            } else {
                out.push_str(&format!("not registered {}\n", name));
            }
        }
        for host in &self.added {
            out.push_str(&format!("added {} as {}\n", host.name, host.id));
        }
        if list {
            out.push_str(&render(&self.hosts));
        }
        out
    }
}

/// Apply the removals, then the additions, and return the resulting registry
///
/// Nothing else may edit the registry while this runs.
pub async fn run(
    store: Arc<dyn LockStore>,
    settings: LockSettings,
    args: &HostsArgs,
) -> anyhow::Result<HostsOutcome> {
    let context = LockContext::new(store, settings)?;
    let mut outcome = HostsOutcome::default();

    for name in &args.remove {
        let was_registered = context.remove_lock_host(name).await?;
        if was_registered {
            info!(host = %name, "Host removed");
        } else {
            info!(host = %name, "Host was not registered");
        }
        outcome.removed.push((name.clone(), was_registered));
    }
    for name in &args.add {
        let id = context.add_lock_host(name).await?;
        info!(host = %name, host_id = id, "Host registered");
        outcome.added.push(LockHost {
            name: name.clone(),
            id,
        });
    }

    outcome.hosts = context.lock_hosts().await?;
    Ok(outcome)
}

/// One `<id>\t<name>` line per host
pub fn render(hosts: &[LockHost]) -> String {
    hosts
        .iter()
        .map(|h| format!("{}\t{}\n", h.id, h.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use casslock_store::MemoryKeyspace;

    fn args(add: &[&str], remove: &[&str]) -> HostsArgs {
        HostsArgs {
            add: add.iter().map(|s| s.to_string()).collect(),
            remove: remove.iter().map(|s| s.to_string()).collect(),
            list: true,
        }
    }

    #[tokio::test]
    async fn test_add_then_remove() {
        let store: Arc<dyn LockStore> = Arc::new(MemoryKeyspace::default());
        let settings = LockSettings::default().with_host_name("admin");

        let outcome = run(store.clone(), settings.clone(), &args(&["web1", "web2", "web3"], &[]))
            .await
            .unwrap();
        assert_eq!(render(&outcome.hosts), "1\tweb1\n2\tweb2\n3\tweb3\n");

        let outcome = run(store, settings, &args(&["web4"], &["web2"])).await.unwrap();
        assert_eq!(render(&outcome.hosts), "1\tweb1\n2\tweb4\n3\tweb3\n");
        assert_eq!(outcome.render(false), "removed web2\nadded web4 as 2\n");
    }

    #[tokio::test]
    async fn test_list_without_table() {
        let store: Arc<dyn LockStore> = Arc::new(MemoryKeyspace::default());
        let outcome = run(store, LockSettings::default(), &args(&[], &["ghost"]))
            .await
            .unwrap();
        assert!(outcome.hosts.is_empty());
        assert_eq!(outcome.render(true), "not registered ghost\n");
    }

    #[tokio::test]
    async fn test_registry_survives_between_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyspace.json");
        let settings = LockSettings::default().with_host_name("admin");

        let keyspace = Arc::new(MemoryKeyspace::open(&path).unwrap());
        run(keyspace.clone(), settings.clone(), &args(&["web1", "web2"], &[]))
            .await
            .unwrap();
        keyspace.save(&path).unwrap();

        let keyspace = Arc::new(MemoryKeyspace::open(&path).unwrap());
        let outcome = run(keyspace.clone(), settings.clone(), &args(&[], &["web1"]))
            .await
            .unwrap();
        assert_eq!(render(&outcome.hosts), "2\tweb2\n");
        keyspace.save(&path).unwrap();

        let keyspace = Arc::new(MemoryKeyspace::open(&path).unwrap());
        let outcome = run(keyspace, settings, &args(&[], &[])).await.unwrap();
        assert_eq!(outcome.render(true), "2\tweb2\n");
    }
}
