use anyhow::Result;
use batch_ledger::revert::diagnose_revert;
use snx_contract::ChainClient;
use tracing::{info, warn};

use crate::config::RevertReasonCmd;

/// Replay a mined transaction at its block and print the reason it reverted with.
pub async fn run<C: ChainClient>(chain: &C, cmd: &RevertReasonCmd) -> Result<()> {
    let diagnosis = diagnose_revert(chain, cmd.tx_hash).await?;
    info!(
        tx_hash = %diagnosis.tx_hash,
        block_number = ?diagnosis.block_number,
        success = ?diagnosis.receipt.map(|receipt| receipt.success),
        "Transaction replayed"
    );

    match diagnosis.reason {
        Some(reason) => println!("{reason}"),
        None => warn!(tx_hash = %cmd.tx_hash, "No revert reason could be decoded"),
    }
    Ok(())
}
