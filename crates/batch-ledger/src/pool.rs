use alloy_primitives::Address;
use alloy_rpc_types::BlockId;
use async_channel::{Receiver as MPMCReceiver, Sender as MPMCSender};
use snx_contract::ChainClient;
use tokio::sync::mpsc::{self, Sender as MPSCSender};
use tracing::{debug, error, info};

use crate::{
    executor::{read_amount, AmountRead, ReadReport},
    AccountPatch, Amount, BatchError, BatchResult, RunContext,
};

pub const DEFAULT_READ_CONCURRENCY: usize = 15;

#[derive(Clone, Debug)]
pub struct ReadPoolConfig {
    pub concurrency: usize,
    pub block: BlockId,
    /// Record zero amounts too. When off, zero reads are retried by the next run.
    pub keep_zero: bool,
}

impl Default for ReadPoolConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_READ_CONCURRENCY,
            block: BlockId::latest(),
            keep_zero: false,
        }
    }
}

type ReadResult = (Address, BatchResult<Amount>);

/// Perform `read` for every candidate that has no recorded value yet, `concurrency` calls at a
/// time. Results are written by this task alone, one ledger save per completion.
pub async fn read_balances_concurrently<C: ChainClient + Clone + 'static>(
    ctx: &mut RunContext<C>,
    candidates: &[Address],
    read: &AmountRead,
    config: &ReadPoolConfig,
) -> BatchResult<ReadReport> {
    if config.concurrency == 0 {
        return Err(BatchError::InvalidInput("Concurrency must be positive".into()));
    }

    let pending = candidates
        .iter()
        .filter(|account| {
            ctx.ledger()
                .account(account)
                .and_then(|record| record.amount(read.name()))
                .is_none()
        })
        .copied()
        .collect::<Vec<_>>();
    let mut report = ReadReport {
        skipped: candidates.len() - pending.len(),
        ..Default::default()
    };
    info!(
        pending = pending.len(),
        skipped = report.skipped,
        workers = config.concurrency,
        "Reading amounts"
    );

    let (task_sender, task_receiver) = async_channel::bounded(config.concurrency);
    let (result_sender, mut result_receiver) = mpsc::channel(config.concurrency);
    for _ in 0..config.concurrency {
        tokio::spawn(read_worker(
            ctx.chain.clone(),
            read.clone(),
            config.block,
            task_receiver.clone(),
            result_sender.clone(),
        ));
    }
    drop(result_sender);
    tokio::spawn(feed(task_sender, pending));

    let total = candidates.len() - report.skipped;
    let mut done = 0;
    while let Some((account, result)) = result_receiver.recv().await {
        done += 1;
        match result {
            Ok(amount) if amount.is_zero() && !config.keep_zero => {
                debug!(account = %account, "Zero amount, not recorded");
                report.read += 1;
            }
            Ok(amount) => {
                ctx.store
                    .upsert_and_save(account, AccountPatch::new().amount(read.name(), amount))?;
                report.read += 1;
                info!(
                    account = %account,
                    amount = %amount.to_ether_string(),
                    progress = %format!("{done}/{total}"),
                    "Recorded amount"
                );
            }
            Err(e) => {
                error!(account = %account, error = %e, "Read failed, left for the next run");
                report.failed.push(account);
            }
        }
    }
    Ok(report)
}

async fn feed(tasks: MPMCSender<Address>, accounts: Vec<Address>) {
    for account in accounts {
        if tasks.send(account).await.is_err() {
            break;
        }
    }
}

async fn read_worker<C: ChainClient>(
    chain: C,
    read: AmountRead,
    block: BlockId,
    tasks: MPMCReceiver<Address>,
    results: MPSCSender<ReadResult>,
) {
    while let Ok(account) = tasks.recv().await {
        let result = read_amount(&chain, &read, account, block).await;
        if results.send((account, result)).await.is_err() {
            break;
        }
    }
}
