//! Lock context
//!
//! A context ties together the store handle, the lock settings and the
//! identity of the calling process. It is cheap to clone and immutable once
//! built, so every lock created from it agrees on the table, timeout, TTL
//! and consistency level.

use std::sync::Arc;

use casslock_common::{CassLockError, LockSettings, Result};
use casslock_store::{LockStore, LockTableOptions, LockTableStore};
use tracing::warn;

use crate::bakery::BakeryLock;
use crate::hosts::{HostRegistry, LockHost};
use crate::identity::ProcessIdentity;

struct ContextInner {
    store: Arc<dyn LockStore>,
    settings: LockSettings,
    identity: ProcessIdentity,
}

/// Shared configuration of every lock taken by one process
#[derive(Clone)]
pub struct LockContext {
    inner: Arc<ContextInner>,
}

impl std::fmt::Debug for LockContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockContext")
            .field("settings", &self.inner.settings)
            .field("identity", &self.inner.identity)
            .finish()
    }
}

impl LockContext {
    /// Context for the current OS process
    pub fn new(store: Arc<dyn LockStore>, settings: LockSettings) -> Result<Self> {
        Self::for_process(store, settings, std::process::id())
    }

    /// Context presenting an explicit process identifier
    ///
    /// Used to simulate several processes inside one, and by runtimes that
    /// assign their own worker identifiers.
    pub fn for_process(
        store: Arc<dyn LockStore>,
        settings: LockSettings,
        pid: u32,
    ) -> Result<Self> {
        let settings = settings.validated()?;
        if !settings.consistency.is_quorum_or_stronger() {
            warn!(
                consistency = %settings.consistency,
                "Lock consistency level is weaker than QUORUM; mutual exclusion is not guaranteed"
            );
        }
        let identity = ProcessIdentity::new(settings.host_name.clone(), pid);
        Ok(Self {
            inner: Arc::new(ContextInner {
                store,
                settings,
                identity,
            }),
        })
    }

    pub fn settings(&self) -> &LockSettings {
        &self.inner.settings
    }

    pub fn identity(&self) -> &ProcessIdentity {
        &self.inner.identity
    }

    pub fn store(&self) -> &Arc<dyn LockStore> {
        &self.inner.store
    }

    /// The lock table, which must already exist
    pub async fn lock_table(&self) -> Result<Arc<dyn LockTableStore>> {
        let name = &self.inner.settings.lock_table_name;
        self.inner.store.find_table(name).await?.ok_or_else(|| {
            CassLockError::Configuration(format!(
                "the lock table '{}' does not exist yet; create it and add your hosts with add_lock_host() before using a lock",
                name
            ))
        })
    }

    /// The lock table, created with the default options if missing
    pub async fn ensure_lock_table(&self) -> Result<Arc<dyn LockTableStore>> {
        let name = &self.inner.settings.lock_table_name;
        if let Some(table) = self.inner.store.find_table(name).await? {
            return Ok(table);
        }
        Ok(self
            .inner
            .store
            .create_table(name, &LockTableOptions::default())
            .await?)
    }

    /// Register a host in the lock table, creating the table if needed
    ///
    /// Only one process may run this at a time.
    pub async fn add_lock_host(&self, host_name: &str) -> Result<u32> {
        let table = self.ensure_lock_table().await?;
        self.registry(table).add(host_name).await
    }

    /// Remove a host from the lock table
    pub async fn remove_lock_host(&self, host_name: &str) -> Result<bool> {
        match self
            .inner
            .store
            .find_table(&self.inner.settings.lock_table_name)
            .await?
        {
            Some(table) => self.registry(table).remove(host_name).await,
            None => Ok(false),
        }
    }

    /// Every registered host, sorted by identifier
    pub async fn lock_hosts(&self) -> Result<Vec<LockHost>> {
        match self
            .inner
            .store
            .find_table(&self.inner.settings.lock_table_name)
            .await?
        {
            Some(table) => self.registry(table).list().await,
            None => Ok(Vec::new()),
        }
    }

    /// Identifier of this context's host
    pub async fn host_id(&self) -> Result<u32> {
        let table = self.lock_table().await?;
        self.registry(table)
            .host_id(&self.inner.settings.host_name)
            .await
    }

    /// Lock `resource`, failing with `AcquisitionTimeout` if the timeout elapses
    pub async fn lock(&self, resource: impl AsRef<[u8]>) -> Result<BakeryLock> {
        BakeryLock::acquire(self, resource).await
    }

    pub(crate) fn registry(&self, table: Arc<dyn LockTableStore>) -> HostRegistry {
        HostRegistry::new(table, self.inner.settings.consistency)
    }
}
