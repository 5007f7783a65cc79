use alloy_rpc_types::BlockId;
use anyhow::{ensure, Result};
use batch_ledger::{
    enumerator::{collect_candidates, EventSource, EventTarget},
    executor::{read_balances, AmountRead},
    RunContext,
};
use snx_contract::{
    deployment::{ContractVersion, Deployment, Network, VersionRegistry},
    ChainClient, RewardEscrow, SynthetixBridgeToBase,
};
use tracing::info;

use crate::{config::TrialScoresCmd, jobs::pin_block};

const BRIDGE_CONTRACT: &str = "SynthetixBridgeToBase";
const ESCROW_CONTRACT: &str = "RewardEscrow";

/// Ledger amount holding the SNX each withdrawer has in escrow.
pub const ESCROWED: &str = "escrowed";

fn withdrawal_sources(versions: &[ContractVersion], to_block: u64) -> Vec<EventSource> {
    versions
        .iter()
        .map(|version| {
            EventSource::new(version.address, 0)
                .up_to(to_block)
                .with_event(EventTarget::primary::<
                    SynthetixBridgeToBase::WithdrawalInitiated,
                >(|withdrawal| withdrawal.account))
        })
        .collect()
}

/// Record the escrowed SNX of every account that ever withdrew through any L2 bridge version.
pub async fn run<C: ChainClient>(
    ctx: &mut RunContext<C>,
    cmd: &TrialScoresCmd,
    network: Network,
) -> Result<()> {
    let deployment_dir = cmd
        .deployment
        .deployment_dir
        .join(network.deployment_dir_name(true));
    let versions = VersionRegistry::load(&deployment_dir)?.versions_of(BRIDGE_CONTRACT);
    ensure!(
        !versions.is_empty(),
        "No `{BRIDGE_CONTRACT}` in the {network} L2 deployment registry"
    );
    for version in &versions {
        info!(address = %version.address, tag = %version.tag, "Bridge version");
    }

    let to_block = pin_block(&mut ctx.store, &ctx.chain, "toBlock", cmd.scan.to_block, 0).await?;
    let withdrawers = collect_candidates(
        &ctx.chain,
        &withdrawal_sources(&versions, to_block),
        cmd.scan.page_size,
    )
    .await?;
    ctx.store.set_meta("withdrawers", &withdrawers.len().to_string())?;
    ctx.store.ensure_total(ESCROWED)?;

    let escrow = Deployment::load(&deployment_dir)?.target(ESCROW_CONTRACT)?;
    let reads = [AmountRead::new::<RewardEscrow::balanceOfCall>(ESCROWED, escrow)];
    let report = read_balances(ctx, withdrawers.addresses(), &reads, BlockId::latest()).await?;

    info!(
        withdrawers = withdrawers.len(),
        read = report.read,
        skipped = report.skipped,
        escrowed = %ctx.ledger().total(ESCROWED).to_ether_string(),
        "Trial scores recorded"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use assert2::assert;

    use super::*;

    #[test]
    fn every_bridge_version_is_scanned_from_genesis() {
        let version = |address| ContractVersion {
            address,
            tag: "v2.0.0".into(),
            release: None,
            date: None,
            commit: None,
        };
        let versions = [
            version(address!("1111111111111111111111111111111111111111")),
            version(address!("2222222222222222222222222222222222222222")),
        ];

        let sources = withdrawal_sources(&versions, 42);

        assert!(sources.len() == 2);
        for (source, version) in sources.iter().zip(&versions) {
            assert!(source.address == version.address);
            assert!(source.from_block == 0);
            assert!(source.to_block == Some(42));
            assert!(source.events[0].name() == "WithdrawalInitiated(address,uint256)");
        }
    }
}
