use alloy_rpc_types::BlockId;
use anyhow::Result;
use batch_ledger::{
    enumerator::{collect_candidates, transfer_participants, EventSource},
    executor::AmountRead,
    pool::{read_balances_concurrently, ReadPoolConfig},
    RunContext,
};
use snx_contract::ChainClient;
use tracing::info;

use crate::{
    config::{DebtsCmd, DEFAULT_HEAD_MARGIN},
    jobs::pin_block,
};

/// Ledger amount holding each account's debt share balance.
pub const DEBT: &str = "debt";

/// Record the debt share balance, at one pinned block, of every account that ever sent or
/// received debt shares. Zero balances are not recorded.
pub async fn run<C: ChainClient + Clone + 'static>(
    ctx: &mut RunContext<C>,
    cmd: &DebtsCmd,
) -> Result<()> {
    ctx.store.pin_meta("contractAddress", &cmd.address.to_string())?;
    ctx.store.pin_meta("deployedBlock", &cmd.deployed_block.to_string())?;
    let latest_block = pin_block(
        &mut ctx.store,
        &ctx.chain,
        "latestBlock",
        cmd.latest_block,
        DEFAULT_HEAD_MARGIN,
    )
    .await?;
    info!(
        contract = %cmd.address,
        deployed_block = cmd.deployed_block,
        latest_block,
        file = %ctx.store.path().display(),
        "Collecting debts"
    );

    let source = EventSource::new(cmd.address, cmd.deployed_block)
        .up_to(latest_block)
        .with_event(transfer_participants());
    let holders = collect_candidates(&ctx.chain, &[source], cmd.page_size).await?;

    let config = ReadPoolConfig {
        concurrency: cmd.concurrency,
        block: BlockId::number(latest_block),
        keep_zero: false,
    };
    let read = AmountRead::token_balance(DEBT, cmd.address);
    let report = read_balances_concurrently(ctx, holders.addresses(), &read, &config).await?;

    info!(
        holders = holders.len(),
        read = report.read,
        skipped = report.skipped,
        failed = report.failed.len(),
        total = %ctx.ledger().total(DEBT).to_ether_string(),
        "Debts recorded"
    );
    Ok(())
}
