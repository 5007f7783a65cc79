use alloy_primitives::Address;
use alloy_rpc_types::BlockId;
use anyhow::Result;
use batch_ledger::{
    enumerator::{scan_events, CandidateSet, EventSource, EventTarget},
    executor::{read_amount, AmountRead},
    AccountPatch, Ledger, RunContext,
};
use snx_contract::{deployment::Network, ChainClient, Synth};
use tracing::{debug, info};

use crate::{config::IssuerBalancesCmd, jobs::pin_block};

const L2_SUSD_CONTRACT: &str = "ProxyERC20sUSD";

/// Ledger amount holding the sUSD balance of issuers above the minimum.
pub const SUSD_BALANCE: &str = "sUSD";
/// Set on issuers holding no more than the minimum, so later runs skip them.
pub const BELOW_MINIMUM: &str = "below_minimum";

fn issue_source(susd: Address, to_block: u64) -> EventSource {
    EventSource::new(susd, 0)
        .up_to(to_block)
        .with_event(EventTarget::primary::<Synth::Issued>(|issued| issued.account))
}

fn is_recorded(ledger: &Ledger, account: &Address) -> bool {
    ledger.account(account).is_some_and(|record| {
        record.amount(SUSD_BALANCE).is_some() || record.flag(BELOW_MINIMUM).is_some()
    })
}

/// Record the L2 sUSD balance of every account that ever issued sUSD, keeping only balances
/// strictly above `--minimum-balance`.
pub async fn run<C: ChainClient>(
    ctx: &mut RunContext<C>,
    cmd: &IssuerBalancesCmd,
    network: Network,
) -> Result<()> {
    let susd = cmd.deployment.target(network, true, L2_SUSD_CONTRACT)?;
    ctx.store.pin_meta("minimumBalance", &cmd.minimum_balance.to_string())?;
    let to_block = pin_block(&mut ctx.store, &ctx.chain, "toBlock", cmd.scan.to_block, 0).await?;

    let source = issue_source(susd, to_block);
    let events = scan_events(&ctx.chain, &source, cmd.scan.page_size)
        .await?
        .collect()
        .await?;
    let issuers = CandidateSet::from_events(&events);
    ctx.store.set_meta("issueEvents", &events.len().to_string())?;
    ctx.store.set_meta("issuers", &issuers.len().to_string())?;
    ctx.store.ensure_total(SUSD_BALANCE)?;
    info!(events = events.len(), issuers = issuers.len(), "Issuers collected");

    let read = AmountRead::token_balance(SUSD_BALANCE, susd);
    for (index, account) in issuers.addresses().iter().enumerate() {
        if is_recorded(ctx.ledger(), account) {
            continue;
        }
        let balance = read_amount(&ctx.chain, &read, *account, BlockId::number(to_block)).await?;
        let progress = format!("{}/{}", index + 1, issuers.len());
        let patch = if balance > cmd.minimum_balance {
            info!(
                account = %account,
                balance = %balance.to_ether_string(),
                progress = %progress,
                "Recorded issuer"
            );
            AccountPatch::new().amount(SUSD_BALANCE, balance)
        } else {
            debug!(account = %account, progress = %progress, "Below the minimum");
            AccountPatch::new().flag(BELOW_MINIMUM, true)
        };
        ctx.store.upsert_and_save(*account, patch)?;
    }

    let above_minimum = ctx
        .ledger()
        .accounts()
        .filter(|(_, record)| record.amount(SUSD_BALANCE).is_some())
        .count();
    ctx.store
        .set_meta("issuersAboveMinimum", &above_minimum.to_string())?;
    info!(
        issuers = issuers.len(),
        above_minimum,
        total = %ctx.ledger().total(SUSD_BALANCE).to_ether_string(),
        "Issuer balances recorded"
    );
    Ok(())
}
