//! `casslock stress`: run the winner/loser scenario and check the result

use std::sync::Arc;

use anyhow::bail;
use casslock_common::LockSettings;
use casslock_core::{StressReport, run_stress};
use casslock_store::LockStore;

use crate::model::StressArgs;

/// Run the scenario; a row with several winners is an error
pub async fn run(
    store: Arc<dyn LockStore>,
    settings: LockSettings,
    args: &StressArgs,
) -> anyhow::Result<StressReport> {
    if args.processes == 0 || args.repeat == 0 {
        bail!("the stress run needs at least one instance and one repetition");
    }

    let report = run_stress(store, settings, &args.to_config()).await?;
    if !report.is_clean() {
        bail!(
            "{} row(s) ended up with more than one winner: {}",
            report.errors.len(),
            report
        );
    }
    Ok(report)
}
