//! One module per batch job. Every job runs load → enumerate → act, persisting after each
//! account.

use std::{fs, path::Path};

use alloy_rpc_types::BlockNumberOrTag;
use anyhow::{anyhow, Result};
use batch_ledger::{executor::BatchReport, Ledger, LedgerStore};
use inquire::Confirm;
use snx_contract::ChainClient;
use tracing::{info, warn};

pub mod active_holders;
pub mod airdrop;
pub mod debts;
pub mod distribute_rewards;
pub mod escrow_migration;
pub mod issuer_balances;
pub mod revert_reason;
#[cfg(test)]
mod test_utils;
pub mod transfer_list;
pub mod trial_scores;

/// Open the ledger at `path`, creating its directory if needed. With `clear`, any previous
/// content is discarded first.
pub fn open_ledger(path: &Path, clear: bool) -> Result<LedgerStore> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    if clear && path.exists() {
        warn!(path = %path.display(), "Clearing ledger");
        batch_ledger::save(&Ledger::default(), path)?;
    }
    Ok(LedgerStore::open(path)?)
}

/// Block a run is bound to: the requested one, else the one pinned by an earlier run, else the
/// chain head minus `head_margin`. The result is pinned under `key`, so asking for a different
/// block than the ledger was built at fails.
pub async fn pin_block<C: ChainClient>(
    store: &mut LedgerStore,
    chain: &C,
    key: &str,
    requested: Option<u64>,
    head_margin: u64,
) -> Result<u64> {
    let pinned = store
        .ledger()
        .meta(key)
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|e| anyhow!("Ledger meta `{key}` is not a block number: {e}"))
        })
        .transpose()?;
    let block = match requested.or(pinned) {
        Some(block) => block,
        None => chain
            .get_block(BlockNumberOrTag::Latest)
            .await?
            .number
            .saturating_sub(head_margin),
    };
    store.pin_meta(key, &block.to_string())?;
    info!(key, block, "Block pinned");
    Ok(block)
}

/// Ask the operator to go on with a write batch, unless `yes`.
pub fn confirm(yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(Confirm::new("Continue?").with_default(false).prompt()?)
}

pub fn log_report(report: &BatchReport) {
    if report.is_clean() {
        info!(pending = report.pending.len(), "All actions settled");
        return;
    }
    let pending = report
        .pending
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    warn!(
        reverted = report.reverted,
        errored = report.errored,
        pending = %pending,
        "Some actions failed; run the job again to retry them"
    );
}
