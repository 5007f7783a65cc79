use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};
use batch_ledger::RunContext;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    chain::{read_only_client, signing_client},
    config::{ChainConfig, CliConfig, Command, LoggingFormat},
    jobs::{
        active_holders, airdrop, debts, distribute_rewards, escrow_migration, issuer_balances,
        open_ledger, revert_reason, transfer_list, trial_scores,
    },
};

mod chain;
mod config;
mod jobs;

fn init_logging(format: LoggingFormat) -> Result<()> {
    const LOG_CONFIGURATION_ENVVAR: &str = "RUST_LOG";

    let filter = EnvFilter::new(
        env::var(LOG_CONFIGURATION_ENVVAR)
            .as_deref()
            .unwrap_or("info"),
    );

    let subscriber = tracing_subscriber::fmt()
        .with_writer(io::stdout)
        .with_target(true)
        .with_env_filter(filter);

    match format {
        LoggingFormat::Json => subscriber.json().try_init(),
        LoggingFormat::Text => subscriber.try_init(),
    }
    .map_err(|err| anyhow!(err))
}

/// Run a write job with a signing client, or with a read-only one when a dry run has no key.
macro_rules! with_write_context {
    ($chain:expr, $write:expr, $data_file:expr, |$ctx:ident| $job:expr) => {{
        let store = open_ledger(&$data_file, false)?;
        match $write.signer()? {
            Some(signer) => {
                let client = signing_client($chain.provider_url.clone(), signer).await?;
                let mut $ctx = RunContext::new(client, store).with_dry_run($write.dry_run);
                $job.await
            }
            None => {
                let client = read_only_client($chain.provider_url.clone()).await?;
                let mut $ctx = RunContext::new(client, store).with_dry_run(true);
                $job.await
            }
        }
    }};
}

async fn run_job(command: &Command, chain: &ChainConfig, data_file: Option<PathBuf>) -> Result<()> {
    let data_file = data_file.ok_or_else(|| anyhow!("`{}` needs a ledger file", command.name()));

    match command {
        Command::ActiveHolders(cmd) => {
            let l2_url = match &cmd.provider_url_l2 {
                Some(url) => url.clone(),
                None => chain
                    .network
                    .public_ovm_provider_url()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("No public L2 endpoint for {}", chain.network))?,
            };
            let l1 = read_only_client(chain.provider_url.clone()).await?;
            let l2 = read_only_client(l2_url).await?;
            let mut ctx = RunContext::new(l2, open_ledger(&data_file?, cmd.clear)?);
            active_holders::run(&l1, &mut ctx, cmd, chain.network).await
        }
        Command::TrialScores(cmd) => {
            let client = read_only_client(chain.provider_url.clone()).await?;
            let mut ctx = RunContext::new(client, open_ledger(&data_file?, false)?);
            trial_scores::run(&mut ctx, cmd, chain.network).await
        }
        Command::DistributeRewards(cmd) => {
            with_write_context!(chain, cmd.write, data_file?, |ctx| {
                distribute_rewards::run(&mut ctx, cmd, chain.network)
            })
        }
        Command::Airdrop(cmd) => {
            with_write_context!(chain, cmd.write, data_file?, |ctx| airdrop::run(&mut ctx, cmd))
        }
        Command::TransferList(cmd) => {
            with_write_context!(chain, cmd.write, data_file?, |ctx| {
                transfer_list::run(&mut ctx, cmd, chain.network)
            })
        }
        Command::EscrowMigration(cmd) => {
            with_write_context!(chain, cmd.write, data_file?, |ctx| {
                escrow_migration::run(&mut ctx, cmd, chain.network)
            })
        }
        Command::IssuerBalances(cmd) => {
            let client = read_only_client(chain.provider_url.clone()).await?;
            let mut ctx = RunContext::new(client, open_ledger(&data_file?, false)?);
            issuer_balances::run(&mut ctx, cmd, chain.network).await
        }
        Command::Debts(cmd) => {
            let client = read_only_client(chain.provider_url.clone()).await?;
            let mut ctx = RunContext::new(client, open_ledger(&data_file?, false)?);
            debts::run(&mut ctx, cmd).await
        }
        Command::RevertReason(cmd) => {
            let client = read_only_client(chain.provider_url.clone()).await?;
            revert_reason::run(&client, cmd).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_config = CliConfig::parse();
    init_logging(cli_config.logging_format()?)?;

    let chain = cli_config.chain()?;
    info!(
        job = cli_config.command.name(),
        network = %chain.network,
        use_ovm = chain.use_ovm,
        "Starting"
    );
    run_job(&cli_config.command, &chain, cli_config.data_file()).await
}
