use alloy_primitives::Address;
use alloy_rpc_types::BlockId;
use anyhow::Result;
use batch_ledger::{
    executor::{read_amount, AmountRead, PendingAction, TransferExecutor},
    Amount, Ledger, RunContext,
};
use snx_contract::ChainClient;
use tracing::{debug, info};

use crate::{
    config::AirdropCmd,
    jobs::{confirm, log_report},
};

/// Accounts holding strictly more than `minimum` of `amount`, in ledger order.
fn eligible_accounts(ledger: &Ledger, amount: &str, minimum: Amount) -> Vec<Address> {
    ledger
        .accounts()
        .filter(|(_, record)| record.amount(amount).is_some_and(|held| held > minimum))
        .map(|(address, _)| *address)
        .collect()
}

/// What it takes to bring `balance` up to `target`, if anything.
fn top_up(target: Amount, balance: Amount) -> Option<Amount> {
    Some(target.saturating_sub(balance)).filter(|missing| !missing.is_zero())
}

/// Bring every eligible account of the ledger up to `--amount-to-drop` of `--token`.
pub async fn run<C: ChainClient>(ctx: &mut RunContext<C>, cmd: &AirdropCmd) -> Result<()> {
    let eligible = eligible_accounts(ctx.ledger(), &cmd.eligibility_amount, cmd.min_eligible);
    info!(
        accounts = ctx.ledger().len(),
        eligible = eligible.len(),
        "Filtered accounts"
    );

    let gas_price = cmd.write.gas_price_wei()?;
    let balance = AmountRead::token_balance("balance", cmd.token);
    let mut actions = vec![];
    for (index, account) in eligible.iter().enumerate() {
        if ctx.ledger().is_complete(account, &cmd.action) {
            continue;
        }
        let current = read_amount(&ctx.chain, &balance, *account, BlockId::latest()).await?;
        let progress = format!("{}/{}", index + 1, eligible.len());
        match top_up(cmd.amount_to_drop, current) {
            Some(missing) => {
                debug!(
                    account = %account,
                    missing = %missing.to_ether_string(),
                    progress = %progress,
                    "Needs a top-up"
                );
                actions.push(
                    PendingAction::new(*account, missing).with_gas(gas_price, cmd.write.gas_limit),
                );
            }
            None => debug!(account = %account, progress = %progress, "Already holds enough"),
        }
    }
    if actions.is_empty() {
        info!("Nothing to airdrop");
        return Ok(());
    }

    let executor = TransferExecutor::new(cmd.action.clone(), cmd.token)
        .with_confirmation_timeout(cmd.write.confirmation_timeout());
    let required = executor.ensure_signer_balance(ctx, &actions).await?;
    info!(
        token = %cmd.token,
        signer = ?ctx.chain.signer_address(),
        accounts = actions.len(),
        target_balance = %cmd.amount_to_drop.to_ether_string(),
        total = %required.to_ether_string(),
        dry_run = ctx.dry_run,
        "Please review this information before continuing"
    );
    if !confirm(cmd.write.yes)? {
        info!("Cancelled");
        return Ok(());
    }

    let report = executor.execute_batch(ctx, &actions).await?;
    log_report(&report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use assert2::assert;
    use batch_ledger::AccountPatch;

    use super::*;

    fn eth(value: &str) -> Amount {
        Amount::from_ether(value).unwrap()
    }

    #[test]
    fn only_accounts_above_the_minimum_are_eligible() {
        let rich = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let exact = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
        let unread = address!("cccccccccccccccccccccccccccccccccccccccc");
        let mut ledger = Ledger::default();
        ledger
            .upsert_account(rich, AccountPatch::new().amount("SNX", eth("1.01")))
            .unwrap();
        ledger
            .upsert_account(exact, AccountPatch::new().amount("SNX", eth("1")))
            .unwrap();
        ledger
            .upsert_account(unread, AccountPatch::new().amount("sUSD", eth("100")))
            .unwrap();

        assert!(eligible_accounts(&ledger, "SNX", eth("1")) == vec![rich]);
    }

    #[test]
    fn top_up_covers_only_the_missing_part() {
        assert!(top_up(eth("0.05"), eth("0.02")) == Some(eth("0.03")));
        assert!(top_up(eth("0.05"), eth("0.05")).is_none());
        assert!(top_up(eth("0.05"), eth("1")).is_none());
    }
}
