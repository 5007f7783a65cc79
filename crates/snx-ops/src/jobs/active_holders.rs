use alloy_primitives::Address;
use alloy_rpc_types::BlockId;
use anyhow::{ensure, Result};
use batch_ledger::{
    enumerator::{collect_candidates, verify_deployments, EventSource, EventTarget},
    executor::{read_balances, AmountRead},
    Amount, RunContext,
};
use snx_contract::{
    deployment::{Deployment, Network, VersionRegistry, KNOWN_MAINNET_BRIDGES_TO_OPTIMISM},
    ChainClient, LegacyBridgeToOptimism, SynthetixBridgeToOptimism,
};
use tracing::info;

use crate::{config::ActiveHoldersCmd, jobs::pin_block};

const BRIDGE_CONTRACT: &str = "SynthetixBridgeToOptimism";
const L2_SNX_CONTRACT: &str = "ProxyERC20";
const L2_SUSD_CONTRACT: &str = "ProxyERC20sUSD";

pub const SNX_BALANCE: &str = "SNX";
pub const SUSD_BALANCE: &str = "sUSD";

/// Deposits (and escrow migrations not accompanied by a deposit) on every L1 bridge version.
fn bridge_sources(to_block: u64) -> Vec<EventSource> {
    let [legacy, current] = KNOWN_MAINNET_BRIDGES_TO_OPTIMISM;
    vec![
        EventSource::new(legacy.address, legacy.from_block)
            .up_to(to_block)
            .with_event(EventTarget::primary::<LegacyBridgeToOptimism::Deposit>(
                |deposit| deposit.account,
            ))
            .with_event(EventTarget::secondary::<
                LegacyBridgeToOptimism::ExportedVestingEntries,
            >(|export| export.account)),
        EventSource::new(current.address, current.from_block)
            .up_to(to_block)
            .with_event(EventTarget::primary::<
                SynthetixBridgeToOptimism::DepositInitiated,
            >(|deposit| deposit._to))
            .with_event(EventTarget::secondary::<
                SynthetixBridgeToOptimism::ExportedVestingEntries,
            >(|export| export.account)),
    ]
}

/// Scan the L1 bridges with `l1`, then record the L2 SNX and sUSD balance of every depositor
/// through `ctx`.
pub async fn run<L1: ChainClient, L2: ChainClient>(
    l1: &L1,
    ctx: &mut RunContext<L2>,
    cmd: &ActiveHoldersCmd,
    network: Network,
) -> Result<()> {
    ensure!(
        network == Network::Mainnet,
        "L1 bridge deployments are only known for mainnet, not {network}"
    );
    let deployment_dir = &cmd.deployment.deployment_dir;

    let registered = VersionRegistry::load(&deployment_dir.join(network.deployment_dir_name(false)))?
        .versions_of(BRIDGE_CONTRACT)
        .into_iter()
        .map(|version| version.address)
        .collect::<Vec<_>>();
    let expected = KNOWN_MAINNET_BRIDGES_TO_OPTIMISM.map(|known| known.address);
    verify_deployments(&expected, &registered)?;

    let to_block = pin_block(&mut ctx.store, l1, "toBlock", cmd.scan.to_block, 0).await?;
    let depositors =
        collect_candidates(l1, &bridge_sources(to_block), cmd.scan.page_size).await?;
    ctx.store.set_meta("depositors", &depositors.len().to_string())?;

    let l2_deployment = Deployment::load(&deployment_dir.join(network.deployment_dir_name(true)))?;
    let reads = [
        AmountRead::token_balance(SNX_BALANCE, l2_deployment.target(L2_SNX_CONTRACT)?),
        AmountRead::token_balance(SUSD_BALANCE, l2_deployment.target(L2_SUSD_CONTRACT)?),
    ];
    let report = read_balances(ctx, depositors.addresses(), &reads, BlockId::latest()).await?;

    let holders = count_holders(ctx.ledger().accounts().map(|(address, record)| {
        (*address, record.amount(SNX_BALANCE).unwrap_or_default())
    }));
    ctx.store.set_meta("holders", &holders.to_string())?;
    info!(
        depositors = depositors.len(),
        holders,
        read = report.read,
        skipped = report.skipped,
        snx = %ctx.ledger().total(SNX_BALANCE).to_ether_string(),
        susd = %ctx.ledger().total(SUSD_BALANCE).to_ether_string(),
        "Active holders recorded"
    );
    Ok(())
}

fn count_holders(balances: impl Iterator<Item = (Address, Amount)>) -> usize {
    balances.filter(|(_, balance)| !balance.is_zero()).count()
}
