use alloy_primitives::Address;
use anyhow::Result;
use batch_ledger::{
    executor::{PendingAction, TransferExecutor},
    list::{load_account_list, AccountList},
    RunContext,
};
use snx_contract::{deployment::Network, ChainClient};
use tracing::{debug, info};

use crate::{
    config::TransferListCmd,
    jobs::{confirm, log_report},
};

const L2_SNX_CONTRACT: &str = "ProxyERC20";

fn resolve_token(cmd: &TransferListCmd, network: Network) -> Result<Address> {
    match cmd.token {
        Some(token) => Ok(token),
        None => cmd.deployment.target(network, true, L2_SNX_CONTRACT),
    }
}

/// One transfer per entry with a nonzero amount, in list order.
fn actions(
    list: &AccountList,
    gas_price: Option<u128>,
    gas_limit: Option<u64>,
) -> Vec<PendingAction> {
    list.entries
        .iter()
        .filter_map(|entry| match entry.amount {
            Some(amount) if !amount.is_zero() => {
                Some(PendingAction::new(entry.account, amount).with_gas(gas_price, gas_limit))
            }
            _ => {
                debug!(account = %entry.account, "Nothing to send");
                None
            }
        })
        .collect()
}

/// Send every account of `--list-file` the amount the list gives it, skipping accounts already
/// paid by an earlier run.
pub async fn run<C: ChainClient>(
    ctx: &mut RunContext<C>,
    cmd: &TransferListCmd,
    network: Network,
) -> Result<()> {
    let list = load_account_list(&cmd.list_file, &cmd.address_field, Some(&cmd.amount_field))?;
    let token = resolve_token(cmd, network)?;
    let actions = actions(&list, cmd.write.gas_price_wei()?, cmd.write.gas_limit);
    let executor = TransferExecutor::new(cmd.action.clone(), token)
        .with_confirmation_timeout(cmd.write.confirmation_timeout());
    let required = executor.ensure_signer_balance(ctx, &actions).await?;
    let already_paid = actions
        .iter()
        .filter(|action| ctx.ledger().is_complete(&action.recipient, &cmd.action))
        .count();

    info!(
        %network,
        %token,
        signer = ?ctx.chain.signer_address(),
        listed = list.len(),
        invalid = list.invalid.len(),
        already_paid,
        pending = actions.len() - already_paid,
        total = %required.to_ether_string(),
        dry_run = ctx.dry_run,
        "Please review this information before continuing"
    );
    if already_paid == actions.len() {
        info!("Nothing left to transfer");
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
