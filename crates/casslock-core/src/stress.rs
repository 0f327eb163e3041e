//! Lock stress scenario
//!
//! Simulated processes race for the same rows of a data table. Inside the
//! lock each one reads the `winner` cell of the row: the first process to
//! get there writes `winner` and `unique<pid>`, every later one writes
//! `loser<pid>`. Once all processes are done, any row holding more than one
//! `unique*` cell proves that two processes were inside the lock together.

use std::sync::Arc;
use std::time::Duration;

use casslock_common::{ConsistencyLevel, LockSettings, Result};
use casslock_store::{CellRangePredicate, CellValue, LockStore, LockTableOptions, LockTableStore};
use futures::future::join_all;
use rand::Rng;
use tracing::{info, warn};

use crate::bakery::BakeryLock;
use crate::context::LockContext;

const WINNER_CELL: &[u8] = b"winner";
const UNIQUE_PREFIX: &str = "unique";
const LOSER_PREFIX: &str = "loser";

/// First process identifier handed to a simulated process
pub const FIRST_SIMULATED_PID: u32 = 1000;

/// Parameters of a stress run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressConfig {
    /// Number of simulated processes
    pub processes: usize,
    /// Rows each process competes for
    pub repeat: usize,
    /// Hosts the processes are spread over; empty means the settings host
    pub hosts: Vec<String>,
    /// Table receiving the winner and loser cells
    pub data_table: String,
    /// Upper bound of the random pause between two rounds, in milliseconds
    pub max_pause_ms: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            processes: 4,
            repeat: 10,
            hosts: Vec::new(),
            data_table: "lock_test".to_string(),
            max_pause_ms: 20,
        }
    }
}

/// Outcome of a stress run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StressReport {
    /// Rows checked after the run
    pub rows: usize,
    pub winners: usize,
    pub losers: usize,
    /// Rounds that gave up because the lock timed out
    pub timeouts: usize,
    /// Rounds that failed on a store error or a crashed task
    pub failures: usize,
    /// Row keys holding more than one `unique*` cell
    pub errors: Vec<Vec<u8>>,
}

impl StressReport {
    /// No two processes ever held the same row together
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for StressReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rows={} winners={} losers={} timeouts={} failures={} errors={}",
            self.rows,
            self.winners,
            self.losers,
            self.timeouts,
            self.failures,
            self.errors.len()
        )
    }
}

#[derive(Debug, Default)]
struct Tally {
    winners: usize,
    losers: usize,
    timeouts: usize,
    failures: usize,
}

/// Row key of round `round`
pub fn stress_row(round: usize) -> Vec<u8> {
    (round as u64).to_be_bytes().to_vec()
}

/// Register the hosts, race the processes, then verify every row
pub async fn run_stress(
    store: Arc<dyn LockStore>,
    settings: LockSettings,
    config: &StressConfig,
) -> Result<StressReport> {
    let hosts = if config.hosts.is_empty() {
        vec![settings.host_name.clone()]
    } else {
        config.hosts.clone()
    };

    let admin = LockContext::new(Arc::clone(&store), settings.clone())?;
    for host in &hosts {
        admin.add_lock_host(host).await?;
    }
    let data = store
        .create_table(&config.data_table, &LockTableOptions::default())
        .await?;

    info!(
        processes = config.processes,
        repeat = config.repeat,
        hosts = hosts.len(),
        table = %config.data_table,
        "Starting lock stress run"
    );

    let mut tasks = Vec::with_capacity(config.processes);
    for i in 0..config.processes {
        let pid = FIRST_SIMULATED_PID + i as u32;
        let host = hosts[i % hosts.len()].clone();
        let context = LockContext::for_process(
            Arc::clone(&store),
            settings.clone().with_host_name(host),
            pid,
        )?;
        let data = Arc::clone(&data);
        let repeat = config.repeat;
        let max_pause_ms = config.max_pause_ms;
        tasks.push(tokio::spawn(async move {
            compete(context, data, repeat, max_pause_ms).await
        }));
    }

    let mut report = StressReport::default();
    for joined in join_all(tasks).await {
        match joined {
            Ok(tally) => {
                report.winners += tally.winners;
                report.losers += tally.losers;
                report.timeouts += tally.timeouts;
                report.failures += tally.failures;
            }
            Err(e) => {
                warn!(error = %e, "Stress process crashed");
                report.failures += 1;
            }
        }
    }

    let (rows, errors) = verify(data.as_ref(), config.repeat, settings.consistency).await?;
    report.rows = rows;
    report.errors = errors;

    if report.is_clean() {
        info!(report = %report, "Lock stress run finished");
    } else {
        warn!(report = %report, "Lock stress run found rows with several winners");
    }
    Ok(report)
}

async fn compete(
    context: LockContext,
    data: Arc<dyn LockTableStore>,
    repeat: usize,
    max_pause_ms: u64,
) -> Tally {
    let mut tally = Tally::default();
    let mut lock = match BakeryLock::new(&context).await {
        Ok(lock) => lock,
        Err(e) => {
            warn!(identity = %context.identity(), error = %e, "Cannot create lock");
            tally.failures += repeat;
            return tally;
        }
    };

    for round in 0..repeat {
        let row = stress_row(round);
        match play_round(&mut lock, data.as_ref(), &row).await {
            Ok(Some(true)) => tally.winners += 1,
            Ok(Some(false)) => tally.losers += 1,
            Ok(None) => tally.timeouts += 1,
            Err(e) => {
                warn!(identity = %context.identity(), round, error = %e, "Stress round failed");
                tally.failures += 1;
            }
        }

        if max_pause_ms > 0 {
            let pause = rand::rng().random_range(0..=max_pause_ms);
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
    }
    tally
}

/// `Some(true)` for the winner, `Some(false)` for a loser, `None` on timeout
async fn play_round(
    lock: &mut BakeryLock,
    data: &dyn LockTableStore,
    row: &[u8],
) -> Result<Option<bool>> {
    if !lock.lock(row).await? {
        return Ok(None);
    }

    let consistency = lock.context().settings().consistency;
    let pid = lock.context().identity().pid;
    let won = data.read_cell(row, WINNER_CELL, consistency).await?.is_none();
    if won {
        data.write_cell(row, WINNER_CELL, CellValue::from_u32(pid), None, consistency)
            .await?;
        data.write_cell(
            row,
            format!("{UNIQUE_PREFIX}{pid}").as_bytes(),
            CellValue::from_u32(pid),
            None,
            consistency,
        )
        .await?;
    } else {
        data.write_cell(
            row,
            format!("{LOSER_PREFIX}{pid}").as_bytes(),
            CellValue::from_u32(pid),
            None,
            consistency,
        )
        .await?;
    }

    lock.unlock().await?;
    Ok(Some(won))
}

/// Count the rows and list those with more than one `unique*` cell
pub async fn verify(
    data: &dyn LockTableStore,
    repeat: usize,
    consistency: ConsistencyLevel,
) -> Result<(usize, Vec<Vec<u8>>)> {
    let predicate = CellRangePredicate::all(repeat.max(1) * 1000, consistency)
        .with_start_key(UNIQUE_PREFIX.as_bytes().to_vec())
        .with_end_key(b"uo".to_vec());

    let mut rows = 0;
    let mut errors = Vec::new();
    for round in 0..repeat {
        let row = stress_row(round);
        if !data.row_exists(&row, consistency).await? {
            continue;
        }
        rows += 1;
        let uniques = data.read_cell_range(&row, &predicate).await?;
        if uniques.len() > 1 {
            warn!(round, winners = uniques.len(), "Row has more than one winner");
            errors.push(row);
        }
    }
    Ok((rows, errors))
}
