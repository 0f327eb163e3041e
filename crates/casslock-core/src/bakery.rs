//! Distributed bakery lock
//!
//! Lamport's bakery algorithm played out over the lock table. Each resource
//! owns two rows: an entering set (`entering::<resource>`) listing the
//! processes busy picking a ticket, and a ticket set (`tickets::<resource>`)
//! holding one cell per process that wants the resource.
//!
//! A lock attempt goes through these phases:
//!
//! 1. `Entering`: write the entering sentinel, take the largest ticket number
//!    plus one, write the ticket cell, then drop the sentinel.
//! 2. `WaitingForEntrants`: wait for every process still in the entering set
//!    to finish picking its own ticket.
//! 3. `WaitingForTurn`: wait for every ticket with a higher priority than
//!    ours to disappear.
//! 4. `Locked`: the resource belongs to this lock until `unlock()` or drop.
//!
//! Each wait sleeps for the poll interval and re-reads the store, bounded by
//! a single deadline taken at the start of `lock()`. A process that dies
//! while holding a ticket blocks the others until the ticket TTL expires.
//!
//! Two lock objects of the same process must not lock the same resource at
//! the same time: they would share host and process identifiers.

use std::borrow::Cow;
use std::sync::Arc;

use casslock_common::{CassLockError, Result, entering_row, tickets_row};
use casslock_store::{CellRangePredicate, CellValue, LockTableStore};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::context::LockContext;
use crate::metrics;
use crate::ticket::{EnteringKey, TicketKey, next_ticket_number};

/// Where a lock stands in the acquisition sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockPhase {
    #[default]
    Unlocked,
    Entering,
    WaitingForEntrants,
    WaitingForTurn,
    Locked,
}

impl LockPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockPhase::Unlocked => "UNLOCKED",
            LockPhase::Entering => "ENTERING",
            LockPhase::WaitingForEntrants => "WAITING_FOR_ENTRANTS",
            LockPhase::WaitingForTurn => "WAITING_FOR_TURN",
            LockPhase::Locked => "LOCKED",
        }
    }
}

impl std::fmt::Display for LockPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A lock on one resource at a time
///
/// Dropping a lock that still holds cells schedules their deletion on the
/// current tokio runtime. That cleanup is best effort; when it cannot run
/// the cells expire through their TTL.
pub struct BakeryLock {
    context: LockContext,
    table: Arc<dyn LockTableStore>,
    phase: LockPhase,
    resource: Vec<u8>,
    entering: Option<EnteringKey>,
    ticket: Option<TicketKey>,
    locked_at: Option<Instant>,
}

impl std::fmt::Debug for BakeryLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BakeryLock")
            .field("table", &self.table.name())
            .field("phase", &self.phase)
            .field("resource", &self.resource_name())
            .field("ticket", &self.ticket)
            .finish()
    }
}

impl BakeryLock {
    /// Create an unlocked lock; the lock table must already exist
    pub async fn new(context: &LockContext) -> Result<Self> {
        let table = context.lock_table().await?;
        Ok(Self {
            context: context.clone(),
            table,
            phase: LockPhase::Unlocked,
            resource: Vec::new(),
            entering: None,
            ticket: None,
            locked_at: None,
        })
    }

    /// Create a lock and acquire `resource` right away
    ///
    /// Running out of time is an `AcquisitionTimeout` error here, since there
    /// is no lock to hand back.
    pub async fn acquire(context: &LockContext, resource: impl AsRef<[u8]>) -> Result<Self> {
        let resource = resource.as_ref();
        if resource.is_empty() {
            return Err(CassLockError::IllegalArgument(
                "cannot lock an empty resource key".to_string(),
            ));
        }

        let mut lock = Self::new(context).await?;
        if lock.lock(resource).await? {
            Ok(lock)
        } else {
            let identity = context.identity();
            Err(CassLockError::AcquisitionTimeout {
                resource: String::from_utf8_lossy(resource).into_owned(),
                host_name: identity.host_name.clone(),
                pid: identity.pid,
            })
        }
    }

    pub fn phase(&self) -> LockPhase {
        self.phase
    }

    pub fn is_locked(&self) -> bool {
        self.phase == LockPhase::Locked
    }

    /// Resource being locked or held, empty when unlocked
    pub fn resource(&self) -> &[u8] {
        &self.resource
    }

    pub fn ticket(&self) -> Option<TicketKey> {
        self.ticket
    }

    pub fn context(&self) -> &LockContext {
        &self.context
    }

    /// Lock `resource`, releasing whatever this object held before
    ///
    /// Returns `Ok(false)` when the timeout elapses first, after deleting the
    /// cells written by this attempt. An empty resource only unlocks.
    pub async fn lock(&mut self, resource: impl AsRef<[u8]>) -> Result<bool> {
        self.unlock().await?;

        let resource = resource.as_ref();
        if resource.is_empty() {
            return Ok(false);
        }

        let started = Instant::now();
        let deadline = started + self.context.settings().lock_timeout();
        let host_id = self
            .context
            .registry(Arc::clone(&self.table))
            .host_id(&self.context.settings().host_name)
            .await?;

        self.resource = resource.to_vec();
        match self.take_turn(host_id, deadline).await {
            Ok(true) => {
                self.phase = LockPhase::Locked;
                self.locked_at = Some(Instant::now());
                metrics::record_acquired(self.table.name(), started.elapsed().as_secs_f64());
                debug!(
                    resource = %self.resource_name(),
                    ticket = ?self.ticket,
                    "Lock acquired"
                );
                Ok(true)
            }
            Ok(false) => {
                metrics::record_timeout(self.table.name());
                info!(
                    resource = %self.resource_name(),
                    identity = %self.context.identity(),
                    timeout_secs = self.context.settings().lock_timeout_secs,
                    "Timed out waiting for lock"
                );
                self.release_cells().await?;
                Ok(false)
            }
            Err(err) => {
                if let Err(cleanup) = self.release_cells().await {
                    debug!(
                        resource = %self.resource_name(),
                        error = %cleanup,
                        "Failed to clean up after lock error"
                    );
                }
                self.phase = LockPhase::Unlocked;
                Err(err)
            }
        }
    }

    /// Release the held resource; a no-op when nothing is held
    pub async fn unlock(&mut self) -> Result<()> {
        if self.ticket.is_none() && self.entering.is_none() {
            self.phase = LockPhase::Unlocked;
            self.resource.clear();
            return Ok(());
        }

        let held = self
            .is_locked()
            .then(|| self.locked_at.map(|at| at.elapsed().as_secs_f64()))
            .flatten();
        let resource = self.resource_name().into_owned();
        self.release_cells().await?;

        if let Some(held_secs) = held {
            metrics::record_released(self.table.name(), held_secs);
            debug!(resource = %resource, held_secs, "Lock released");
        }
        Ok(())
    }

    async fn take_turn(&mut self, host_id: u32, deadline: Instant) -> Result<bool> {
        let settings = self.context.settings().clone();
        let consistency = settings.consistency;
        let pid = self.context.identity().pid;
        let entering_row = entering_row(&self.resource);
        let tickets_row = tickets_row(&self.resource);

        self.phase = LockPhase::Entering;
        let entering = EnteringKey::new(host_id, pid);
        self.entering = Some(entering);
        self.table
            .write_cell(
                &entering_row,
                &entering.encode(),
                CellValue::sentinel(),
                Some(settings.entering_ttl()),
                consistency,
            )
            .await?;

        let tickets = self.read_row(&tickets_row, None).await?;
        let number = next_ticket_number(self.decode_tickets(&tickets).map(|t| t.number))
            .ok_or(CassLockError::TicketOverflow)?;
        let ticket = TicketKey::new(number, host_id, pid);
        self.ticket = Some(ticket);
        self.table
            .write_cell(
                &tickets_row,
                &ticket.encode(),
                CellValue::sentinel(),
                settings.ticket_ttl(),
                consistency,
            )
            .await?;

        self.table
            .drop_cell(&entering_row, &entering.encode(), consistency)
            .await?;
        self.entering = None;

        self.phase = LockPhase::WaitingForEntrants;
        for (key, _) in self.read_row(&entering_row, None).await? {
            if !self.wait_until_gone(&entering_row, &key, deadline).await? {
                return Ok(false);
            }
        }

        self.phase = LockPhase::WaitingForTurn;
        let ahead = self
            .read_row(&tickets_row, Some(ticket.encode().to_vec()))
            .await?;
        let ahead: Vec<TicketKey> = self
            .decode_tickets(&ahead)
            .filter(|other| other.has_priority_over(&ticket))
            .collect();
        for other in ahead {
            debug!(
                resource = %self.resource_name(),
                ticket = %ticket,
                ahead = %other,
                "Waiting for ticket ahead"
            );
            if !self
                .wait_until_gone(&tickets_row, &other.encode(), deadline)
                .await?
            {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Cells of `row`, optionally up to `end_key` included
    async fn read_row(
        &self,
        row: &[u8],
        end_key: Option<Vec<u8>>,
    ) -> Result<Vec<(Vec<u8>, CellValue)>> {
        let consistency = self.context.settings().consistency;
        let count = self.table.count_cells(row, consistency).await?;
        let mut predicate = CellRangePredicate::all(count + 100, consistency);
        if let Some(end_key) = end_key {
            predicate = predicate.with_end_key(end_key);
        }
        Ok(self.table.read_cell_range(row, &predicate).await?)
    }

    fn decode_tickets<'a>(
        &'a self,
        cells: &'a [(Vec<u8>, CellValue)],
    ) -> impl Iterator<Item = TicketKey> + 'a {
        cells.iter().filter_map(move |(key, _)| {
            let ticket = TicketKey::decode(key);
            if ticket.is_none() {
                warn!(
                    resource = %self.resource_name(),
                    key_len = key.len(),
                    "Skipping malformed ticket key"
                );
            }
            ticket
        })
    }

    /// Poll `cell` until it disappears; `false` when the deadline passes first
    async fn wait_until_gone(&self, row: &[u8], cell: &[u8], deadline: Instant) -> Result<bool> {
        let consistency = self.context.settings().consistency;
        while self.table.cell_exists(row, cell, consistency).await? {
            if !self.pause(deadline).await {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn pause(&self, deadline: Instant) -> bool {
        sleep(self.context.settings().poll_interval()).await;
        Instant::now() < deadline
    }

    /// Delete the entering and ticket cells still owned by this lock
    async fn release_cells(&mut self) -> Result<()> {
        let consistency = self.context.settings().consistency;

        if let Some(entering) = self.entering {
            self.table
                .drop_cell(&entering_row(&self.resource), &entering.encode(), consistency)
                .await?;
            self.entering = None;
        }
        if let Some(ticket) = self.ticket {
            self.table
                .drop_cell(&tickets_row(&self.resource), &ticket.encode(), consistency)
                .await?;
            self.ticket = None;
        }

        self.phase = LockPhase::Unlocked;
        self.resource.clear();
        self.locked_at = None;
        Ok(())
    }

    fn resource_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.resource)
    }
}

impl Drop for BakeryLock {
    fn drop(&mut self) {
        let entering = self.entering.take();
        let ticket = self.ticket.take();
        if entering.is_none() && ticket.is_none() {
            return;
        }

        if self.is_locked() {
            let held = self
                .locked_at
                .map(|at| at.elapsed().as_secs_f64())
                .unwrap_or_default();
            metrics::record_released(self.table.name(), held);
        }

        let table = Arc::clone(&self.table);
        let consistency = self.context.settings().consistency;
        let resource = std::mem::take(&mut self.resource);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let name = String::from_utf8_lossy(&resource).into_owned();
                    if let Some(entering) = entering
                        && let Err(e) = table
                            .drop_cell(&entering_row(&resource), &entering.encode(), consistency)
                            .await
                    {
                        debug!(resource = %name, error = %e, "Failed to drop entering cell on drop");
                    }
                    if let Some(ticket) = ticket
                        && let Err(e) = table
                            .drop_cell(&tickets_row(&resource), &ticket.encode(), consistency)
                            .await
                    {
                        debug!(resource = %name, error = %e, "Failed to drop ticket on drop");
                    }
                });
            }
            Err(_) => {
                warn!(
                    resource = %String::from_utf8_lossy(&resource),
                    "Lock dropped outside a tokio runtime; its cells will expire through their TTL"
                );
            }
        }
    }
}
