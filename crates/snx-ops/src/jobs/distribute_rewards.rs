use alloy_primitives::Address;
use anyhow::Result;
use batch_ledger::{
    distribution::{plan_distribution, DistributionPlan},
    executor::{PendingAction, TransferExecutor},
    RunContext,
};
use snx_contract::{deployment::Network, ChainClient};
use tracing::info;

use crate::{
    config::DistributeRewardsCmd,
    jobs::{confirm, log_report},
};

const L2_SNX_CONTRACT: &str = "ProxyERC20";

fn resolve_token(cmd: &DistributeRewardsCmd, network: Network) -> Result<Address> {
    match cmd.token {
        Some(token) => Ok(token),
        None => cmd.deployment.target(network, true, L2_SNX_CONTRACT),
    }
}

fn actions(
    plan: &DistributionPlan,
    gas_price: Option<u128>,
    gas_limit: Option<u64>,
) -> Vec<PendingAction> {
    plan.shares
        .iter()
        .map(|(account, share)| PendingAction::new(*account, *share).with_gas(gas_price, gas_limit))
        .collect()
}

/// Split `--total-rewards` over the `--weight` amounts of the ledger and transfer every share
/// not paid yet.
pub async fn run<C: ChainClient>(
    ctx: &mut RunContext<C>,
    cmd: &DistributeRewardsCmd,
    network: Network,
) -> Result<()> {
    let token = resolve_token(cmd, network)?;
    let plan = plan_distribution(ctx.ledger(), &cmd.weight, &cmd.action, cmd.total_rewards)?;
    let actions = actions(&plan, cmd.write.gas_price_wei()?, cmd.write.gas_limit);
    let executor = TransferExecutor::new(cmd.action.clone(), token)
        .with_confirmation_timeout(cmd.write.confirmation_timeout());
    let required = executor.ensure_signer_balance(ctx, &actions).await?;

    info!(
        %network,
        %token,
        signer = ?ctx.chain.signer_address(),
        accounts = actions.len(),
        rewards = %cmd.total_rewards.to_ether_string(),
        already_distributed = %ctx.ledger().total(&executor.amount_name()).to_ether_string(),
        pending = %required.to_ether_string(),
        weight_total = %ctx.ledger().total(&cmd.weight).to_ether_string(),
        multiplier = %plan.multiplier,
        dry_run = ctx.dry_run,
        "Please review this information before continuing"
    );
    if actions.is_empty() {
        info!("Nothing left to distribute");
        return Ok(());
    }
    if !confirm(cmd.write.yes)? {
        info!("Cancelled");
        return Ok(());
    }

    let report = executor.execute_batch(ctx, &actions).await?;
    log_report(&report);
    Ok(())
}
