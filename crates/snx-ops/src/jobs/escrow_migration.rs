use alloy_primitives::{Address, U256};
use alloy_rpc_types::BlockId;
use alloy_sol_types::SolCall;
use anyhow::{bail, Result};
use batch_ledger::{
    executor::{call_request, read_amount, ActionOutcome, AmountRead, Confirmation},
    list::load_account_list,
    AccountPatch, Amount, BatchResult, RunContext,
};
use snx_contract::{
    deployment::Network, ChainClient, RewardEscrow, RewardEscrowSchedule, RewardEscrowV2,
};
use tracing::{error, info, warn};

use crate::{config::EscrowMigrationCmd, jobs::confirm};

const ESCROW_CONTRACT: &str = "RewardEscrow";
const ESCROW_V2_CONTRACT: &str = "RewardEscrowV2";

pub const ESCROWED: &str = "escrowed";
pub const VESTED: &str = "vested";
pub const MIGRATE: &str = "migrate";
/// Why an account is left out of the balance migration.
pub const MIGRATE_SKIPPED: &str = "migrate_skipped";
pub const IMPORT_VESTING: &str = "import_vesting";
/// Why an account is left out of the vesting import.
pub const IMPORT_VESTING_SKIPPED: &str = "import_vesting_skipped";

#[derive(Copy, Clone, Debug)]
struct Escrows {
    v1: Address,
    v2: Address,
}

fn resolve_escrows(cmd: &EscrowMigrationCmd, network: Network) -> Result<Escrows> {
    let v1 = match cmd.reward_escrow {
        Some(address) => address,
        None => cmd.deployment.target(network, false, ESCROW_CONTRACT)?,
    };
    let v2 = match cmd.reward_escrow_v2 {
        Some(address) => address,
        None => cmd.deployment.target(network, false, ESCROW_V2_CONTRACT)?,
    };
    Ok(Escrows { v1, v2 })
}

/// Where an account stands before its balances are migrated.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Standing {
    Ready { escrowed: Amount, vested: Amount },
    Skipped(&'static str),
}

async fn inspect<C: ChainClient>(
    chain: &C,
    escrows: Escrows,
    account: Address,
) -> BatchResult<Standing> {
    let latest = BlockId::latest();
    let pending = AmountRead::new::<RewardEscrowV2::totalBalancePendingMigrationCall>(
        "pending",
        escrows.v2,
    );
    if !read_amount(chain, &pending, account, latest).await?.is_zero() {
        return Ok(Standing::Skipped("already migrated, pending entry import"));
    }
    let escrowed_v2 = AmountRead::new::<RewardEscrowV2::totalEscrowedAccountBalanceCall>(
        "escrowed_v2",
        escrows.v2,
    );
    if !read_amount(chain, &escrowed_v2, account, latest).await?.is_zero() {
        return Ok(Standing::Skipped("escrow amounts already exist"));
    }

    let escrowed = AmountRead::new::<RewardEscrow::totalEscrowedAccountBalanceCall>(
        ESCROWED,
        escrows.v1,
    );
    let vested =
        AmountRead::new::<RewardEscrow::totalVestedAccountBalanceCall>(VESTED, escrows.v1);
    Ok(Standing::Ready {
        escrowed: read_amount(chain, &escrowed, account, latest).await?,
        vested: read_amount(chain, &vested, account, latest).await?,
    })
}

/// One account's balances to carry over.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Migration {
    account: Address,
    escrowed: Amount,
    vested: Amount,
}

/// Accounts of the list still to migrate, inspecting the ones no earlier run has looked at. The
/// findings are recorded, except in a dry run.
async fn plan_migrations<C: ChainClient>(
    ctx: &mut RunContext<C>,
    escrows: Escrows,
    accounts: &[Address],
) -> Result<Vec<Migration>> {
    let mut migrations = vec![];
    for (index, account) in accounts.iter().enumerate() {
        let progress = format!("{}/{}", index + 1, accounts.len());
        let record = ctx.ledger().account(account);
        if record.is_some_and(|record| {
            record.is_complete(MIGRATE) || record.flag(MIGRATE_SKIPPED).is_some()
        }) {
            continue;
        }
        let recorded = record.and_then(|record| {
            Some(Standing::Ready {
                escrowed: record.amount(ESCROWED)?,
                vested: record.amount(VESTED)?,
            })
        });
        let standing = match recorded {
            Some(standing) => standing,
            None => {
                let standing = inspect(&ctx.chain, escrows, *account).await?;
                let patch = match &standing {
                    Standing::Ready { escrowed, vested } => AccountPatch::new()
                        .amount(ESCROWED, *escrowed)
                        .amount(VESTED, *vested),
                    Standing::Skipped(reason) => {
                        AccountPatch::new().flag(MIGRATE_SKIPPED, *reason)
                    }
                };
                if !ctx.dry_run {
                    ctx.store.upsert_and_save(*account, patch)?;
                }
                standing
            }
        };
        match standing {
            Standing::Ready { escrowed, vested } => migrations.push(Migration {
                account: *account,
                escrowed,
                vested,
            }),
            Standing::Skipped(reason) => {
                info!(account = %account, progress = %progress, reason, "Not migrating");
            }
        }
    }
    Ok(migrations)
}

fn migrate_calldata(batch: &[Migration]) -> Vec<u8> {
    RewardEscrowV2::migrateAccountEscrowBalancesCall {
        accounts: batch.iter().map(|migration| migration.account).collect(),
        escrowBalances: batch.iter().map(|migration| migration.escrowed.into()).collect(),
        vestedBalances: batch.iter().map(|migration| migration.vested.into()).collect(),
    }
    .abi_encode()
}

/// Non-empty `(timestamp, amount)` pairs of a flattened schedule.
fn vesting_entries(account: Address, flat_schedule: &[U256]) -> Vec<(U256, U256)> {
    flat_schedule
        .chunks_exact(2)
        .filter(|pair| !(pair[0].is_zero() && pair[1].is_zero()))
        .map(|pair| {
            if pair[0].is_zero() || pair[1].is_zero() {
                warn!(
                    account = %account,
                    timestamp = %pair[0],
                    amount = %pair[1],
                    "Half-empty vesting entry"
                );
            }
            (pair[0], pair[1])
        })
        .collect()
}

type Schedule = (Address, Vec<(U256, U256)>);

/// Group whole schedules so that a group holds at most `limit` entries. A schedule longer than
/// `limit` makes a group of its own.
fn pack_schedules(schedules: Vec<Schedule>, limit: usize) -> Vec<Vec<Schedule>> {
    let mut groups: Vec<Vec<Schedule>> = vec![];
    let mut size = 0;
    for schedule in schedules {
        let entries = schedule.1.len();
        match groups.last_mut() {
            Some(group) if size + entries <= limit => {
                group.push(schedule);
                size += entries;
            }
            _ => {
                groups.push(vec![schedule]);
                size = entries;
            }
        }
    }
    groups
}

fn import_calldata(group: &[Schedule]) -> Vec<u8> {
    let entries = group
        .iter()
        .flat_map(|(account, entries)| entries.iter().map(move |entry| (*account, *entry)));
    let mut call = RewardEscrowV2::importVestingScheduleCall {
        accounts: vec![],
        vestingTimestamps: vec![],
        escrowAmounts: vec![],
    };
    for (account, (timestamp, amount)) in entries {
        call.accounts.push(account);
        call.vestingTimestamps.push(timestamp);
        call.escrowAmounts.push(amount);
    }
    call.abi_encode()
}

/// Schedules to import for the migrated accounts. Accounts whose new escrow already has entries,
/// or that have nothing to import, are settled here.
async fn plan_imports<C: ChainClient>(
    ctx: &mut RunContext<C>,
    escrows: Escrows,
    migrated: &[Address],
) -> Result<Vec<Schedule>> {
    let latest = BlockId::latest();
    let existing =
        AmountRead::new::<RewardEscrowV2::numVestingEntriesCall>("entries", escrows.v2);
    let mut schedules = vec![];
    for account in migrated {
        let record = ctx.ledger().account(account);
        if record.is_some_and(|record| {
            record.is_complete(IMPORT_VESTING) || record.flag(IMPORT_VESTING_SKIPPED).is_some()
        }) {
            continue;
        }

        let already_imported = read_amount(&ctx.chain, &existing, *account, latest).await?;
        let settled = if !already_imported.is_zero() {
            warn!(account = %account, entries = %already_imported, "Vesting entries already exist");
            Some(AccountPatch::new().flag(
                IMPORT_VESTING_SKIPPED,
                format!("already has {already_imported} vesting entries"),
            ))
        } else {
            let call = RewardEscrowSchedule::checkAccountScheduleCall { account: *account };
            let request = call_request(escrows.v1, call.abi_encode(), None, None, None);
            let output = ctx.chain.call(&request, latest).await?;
            let flat_schedule =
                RewardEscrowSchedule::checkAccountScheduleCall::abi_decode_returns(&output, true)?
                    ._0;
            let entries = vesting_entries(*account, &flat_schedule);
            if entries.is_empty() {
                Some(AccountPatch::new().flag(IMPORT_VESTING, true))
            } else {
                schedules.push((*account, entries));
                None
            }
        };
        match settled {
            Some(patch) if !ctx.dry_run => ctx.store.upsert_and_save(*account, patch)?,
            _ => {}
        }
    }
    Ok(schedules)
}

/// Send one batch call and, once it is mined, mark every account of the batch with `action`.
/// Returns whether the batch went through (or would have, in a dry run).
async fn settle_batch<C: ChainClient>(
    ctx: &mut RunContext<C>,
    cmd: &EscrowMigrationCmd,
    escrows: Escrows,
    action: &str,
    accounts: &[Address],
    calldata: Vec<u8>,
) -> Result<bool> {
    if ctx.dry_run {
        info!(action, accounts = ?accounts, "Dry run, would send batch");
        return Ok(true);
    }
    let request = call_request(
        escrows.v2,
        calldata,
        ctx.chain.signer_address(),
        cmd.write.gas_price_wei()?,
        cmd.write.gas_limit,
    );
    let confirmation = Confirmation {
        timeout: cmd.write.confirmation_timeout(),
        ..Confirmation::default()
    };
    let tx_hash = match confirmation.send_and_confirm(&ctx.chain, request).await {
        ActionOutcome::Confirmed { tx_hash, .. } => tx_hash,
        outcome => {
            if let Some(err) = accounts.first().and_then(|account| outcome.error(*account)) {
                error!(action, accounts = accounts.len(), error = %err, "Batch failed");
            }
            return Ok(false);
        }
    };
    for account in accounts {
        let patch = AccountPatch::new()
            .flag(action, true)
            .flag(format!("{action}_tx"), tx_hash);
        ctx.store.upsert_and_save(*account, patch)?;
    }
    info!(action, accounts = accounts.len(), %tx_hash, "Batch confirmed");
    Ok(true)
}

/// Move the escrow balances of every account of `--account-json` from the first escrow version
/// to the second in batches, then import their vesting entries.
pub async fn run<C: ChainClient>(
    ctx: &mut RunContext<C>,
    cmd: &EscrowMigrationCmd,
    network: Network,
) -> Result<()> {
    if cmd.batch_size == 0 || cmd.vesting_batch_size == 0 {
        bail!("Batch sizes must be positive");
    }
    if !ctx.dry_run && ctx.chain.signer_address().is_none() {
        bail!("A signer is required to migrate escrow");
    }
    let list = load_account_list(&cmd.account_json, &cmd.address_field, None)?;
    let accounts = list.accounts().collect::<Vec<_>>();
    let escrows = resolve_escrows(cmd, network)?;

    let migrations = plan_migrations(ctx, escrows, &accounts).await?;
    let total_escrowed = Amount::sum(migrations.iter().map(|migration| &migration.escrowed))?;
    info!(
        %network,
        from = %escrows.v1,
        to = %escrows.v2,
        signer = ?ctx.chain.signer_address(),
        listed = accounts.len(),
        to_migrate = migrations.len(),
        escrowed = %total_escrowed.to_ether_string(),
        batches = migrations.len().div_ceil(cmd.batch_size),
        dry_run = ctx.dry_run,
        "Please review this information before continuing"
    );
    if !migrations.is_empty() && !confirm(cmd.write.yes)? {
        info!("Cancelled");
        return Ok(());
    }

    let mut migrated = accounts
        .iter()
        .filter(|account| ctx.ledger().is_complete(account, MIGRATE))
        .copied()
        .collect::<Vec<_>>();
    for batch in migrations.chunks(cmd.batch_size) {
        let batch_accounts = batch.iter().map(|migration| migration.account).collect::<Vec<_>>();
        let calldata = migrate_calldata(batch);
        if settle_batch(ctx, cmd, escrows, MIGRATE, &batch_accounts, calldata).await? {
            migrated.extend(batch_accounts);
        }
    }

    if cmd.skip_vesting_import {
        return Ok(());
    }
    let schedules = plan_imports(ctx, escrows, &migrated).await?;
    if schedules.is_empty() {
        info!("No vesting entries to import");
        return Ok(());
    }
    let groups = pack_schedules(schedules, cmd.vesting_batch_size);
    info!(
        accounts = groups.iter().map(Vec::len).sum::<usize>(),
        batches = groups.len(),
        "Importing vesting entries"
    );
    for group in &groups {
        let group_accounts = group.iter().map(|(account, _)| *account).collect::<Vec<_>>();
        settle_batch(
            ctx,
            cmd,
            escrows,
            IMPORT_VESTING,
            &group_accounts,
            import_calldata(group),
        )
        .await?;
    }
    Ok(())
}
