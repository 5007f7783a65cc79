use std::path::PathBuf;

use alloy_primitives::{Address, TxHash};
use batch_ledger::{enumerator::DEFAULT_PAGE_SIZE, pool::DEFAULT_READ_CONCURRENCY, Amount};
use clap::{Args, Parser, Subcommand};
use snx_contract::deployment::Network;

use crate::config::{
    defaults::*, enums::LoggingFormat, parsing, LOGGING_FORMAT_ENV, PRIVATE_KEY_ENV,
    PROVIDER_URL_ENV,
};

/// Batch jobs against the Synthetix contracts. Every job keeps its results in a JSON ledger
/// that is saved after each account, so an interrupted run picks up where it stopped.
#[derive(Clone, Eq, PartialEq, Debug, Parser)]
#[clap(name = "snx-ops", version)]
pub struct CliConfig {
    #[clap(
        short = 'l',
        long,
        value_enum,
        global = true,
        help = "Logging format configuration.",
        long_help = format!("Logging format configuration. If not provided, the value from the \
            environment variable `{LOGGING_FORMAT_ENV}` will be used. If that is not set, the \
            default value is `{DEFAULT_LOGGING_FORMAT:?}`.")
    )]
    pub logging_format: Option<LoggingFormat>,

    /// Network whose contracts and deployment data are used.
    #[clap(long, value_enum, global = true, default_value = "mainnet")]
    pub network: Network,

    /// Use the Optimism (L2) variant of `network`.
    #[clap(long, global = true)]
    pub use_ovm: bool,

    #[clap(
        long,
        global = true,
        help = "RPC endpoint of the node to connect to.",
        long_help = format!("RPC endpoint of the node to connect to. If not provided, the value \
            from the environment variable `{PROVIDER_URL_ENV}` will be used, with the word \
            `network` in it replaced by the network name. If that is not set, the public \
            Optimism endpoint is used for L2 networks and `{DEFAULT_LOCAL_PROVIDER_URL}` for \
            `local`.")
    )]
    pub provider_url: Option<String>,

    /// Ledger file of the job. Defaults to a per-job file under `data/`.
    #[clap(long, global = true, value_parser = parsing::parse_path)]
    pub data_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Clone, Eq, PartialEq, Debug, Subcommand)]
pub enum Command {
    /// Collect every account that bridged SNX or migrated escrow to L2 and record its L2 SNX
    /// and sUSD balances.
    ActiveHolders(ActiveHoldersCmd),
    /// Collect every account that withdrew from L2 and record its escrowed SNX.
    TrialScores(TrialScoresCmd),
    /// Split a reward pool over the escrowed SNX recorded by `trial-scores` and send every
    /// share.
    DistributeRewards(DistributeRewardsCmd),
    /// Top up every eligible account of an `active-holders` ledger to a fixed token balance.
    Airdrop(AirdropCmd),
    /// Send every account of a JSON list its own amount of a token.
    TransferList(TransferListCmd),
    /// Move the escrow balances of a JSON list of accounts from `RewardEscrow` to
    /// `RewardEscrowV2`, then import their vesting entries.
    EscrowMigration(EscrowMigrationCmd),
    /// Record the sUSD balance of every account that ever issued sUSD.
    IssuerBalances(IssuerBalancesCmd),
    /// Record the debt share balance of every `SynthetixDebtShare` holder at a pinned block.
    Debts(DebtsCmd),
    /// Explain why a mined transaction reverted.
    RevertReason(RevertReasonCmd),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::ActiveHolders(_) => "active-holders",
            Command::TrialScores(_) => "trial-scores",
            Command::DistributeRewards(_) => "distribute-rewards",
            Command::Airdrop(_) => "airdrop",
            Command::TransferList(_) => "transfer-list",
            Command::EscrowMigration(_) => "escrow-migration",
            Command::IssuerBalances(_) => "issuer-balances",
            Command::Debts(_) => "debts",
            Command::RevertReason(_) => "revert-reason",
        }
    }

    /// Ledger used when `--data-file` is not given. `None` for jobs that keep no ledger.
    pub fn default_data_file(&self) -> Option<PathBuf> {
        let file_name = match self {
            Command::ActiveHolders(_) => "l2-active-snx-holders.json".to_string(),
            Command::TrialScores(_) | Command::DistributeRewards(_) => {
                "l2-trial-scores.json".to_string()
            }
            Command::Airdrop(_) => "l2-active-snx-holders.json".to_string(),
            Command::TransferList(_) => "l2-snx-airdrop.json".to_string(),
            Command::EscrowMigration(_) => "reward-escrow-migration.json".to_string(),
            Command::IssuerBalances(_) => "l2-issuer-balances.json".to_string(),
            Command::Debts(DebtsCmd { deployed_block, .. }) => {
                format!("{deployed_block}-users-debts.json")
            }
            Command::RevertReason(_) => return None,
        };
        Some(PathBuf::from(DEFAULT_DATA_DIR).join(file_name))
    }
}

/// Where the published deployment data (`<network>[-ovm]/versions.json`, `deployment.json`)
/// lives.
#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct DeploymentArgs {
    #[clap(long, default_value = DEFAULT_DEPLOYMENT_DIR, value_parser = parsing::parse_path)]
    pub deployment_dir: PathBuf,
}

#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct ScanArgs {
    /// Last block to scan. Pinned in the ledger by the first run; defaults to the chain head.
    #[clap(long)]
    pub to_block: Option<u64>,

    /// Number of blocks covered by one `eth_getLogs` request.
    #[clap(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u64,
}

#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct WriteArgs {
    #[clap(
        long,
        help = "Report what would be sent without sending anything.",
        long_help = format!("Report what would be sent without sending anything. The signing key \
            (environment variable `{PRIVATE_KEY_ENV}`) is optional in this mode.")
    )]
    pub dry_run: bool,

    /// Skip the confirmation prompt.
    #[clap(long)]
    pub yes: bool,

    /// Gas price in gwei. Left to the node when not given.
    #[clap(long, value_parser = parsing::parse_gwei)]
    pub gas_price: Option<Amount>,

    /// Gas limit of every transfer. Estimated when not given.
    #[clap(long)]
    pub gas_limit: Option<u64>,

    /// Seconds to wait for a receipt before giving up on a transfer.
    #[clap(long, default_value_t = DEFAULT_CONFIRMATION_TIMEOUT_SECS)]
    pub confirmation_timeout: u64,
}

#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct ActiveHoldersCmd {
    /// RPC endpoint of the L2 node the balances are read from. Defaults to the public Optimism
    /// endpoint of `network`.
    #[clap(long)]
    pub provider_url_l2: Option<String>,

    /// Start from an empty ledger instead of resuming.
    #[clap(long)]
    pub clear: bool,

    #[clap(flatten)]
    pub deployment: DeploymentArgs,

    #[clap(flatten)]
    pub scan: ScanArgs,
}

#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct TrialScoresCmd {
    #[clap(flatten)]
    pub deployment: DeploymentArgs,

    #[clap(flatten)]
    pub scan: ScanArgs,
}

#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct DistributeRewardsCmd {
    /// Total amount of SNX to distribute, in SNX.
    #[clap(long, default_value = DEFAULT_TOTAL_REWARDS, value_parser = parsing::parse_ether)]
    pub total_rewards: Amount,

    /// Ledger amount the pool is split over.
    #[clap(long, default_value = DEFAULT_REWARD_WEIGHT)]
    pub weight: String,

    /// Name under which transfers are recorded in the ledger.
    #[clap(long, default_value = DEFAULT_DISTRIBUTION_ACTION)]
    pub action: String,

    /// Token to distribute. Defaults to the L2 `ProxyERC20` (SNX) of the deployment.
    #[clap(long)]
    pub token: Option<Address>,

    #[clap(flatten)]
    pub deployment: DeploymentArgs,

    #[clap(flatten)]
    pub write: WriteArgs,
}

#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct AirdropCmd {
    /// Token to airdrop (e.g. L2 WETH).
    #[clap(long)]
    pub token: Address,

    /// Balance every eligible account is topped up to, in whole tokens.
    #[clap(long, default_value = DEFAULT_AMOUNT_TO_DROP, value_parser = parsing::parse_ether)]
    pub amount_to_drop: Amount,

    /// Ledger amount deciding eligibility.
    #[clap(long, default_value = DEFAULT_ELIGIBILITY_AMOUNT)]
    pub eligibility_amount: String,

    /// Accounts need strictly more than this (in whole tokens) of `eligibility_amount`.
    #[clap(long, default_value = DEFAULT_MIN_ELIGIBLE_BALANCE, value_parser = parsing::parse_ether)]
    pub min_eligible: Amount,

    /// Name under which transfers are recorded in the ledger.
    #[clap(long, default_value = DEFAULT_AIRDROP_ACTION)]
    pub action: String,

    #[clap(flatten)]
    pub write: WriteArgs,
}

#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct TransferListCmd {
    /// JSON array of objects, one per account to pay.
    #[clap(long, value_parser = parsing::parse_path)]
    pub list_file: PathBuf,

    /// Field of a list entry holding the account.
    #[clap(long, default_value = DEFAULT_LIST_ADDRESS_FIELD)]
    pub address_field: String,

    /// Field of a list entry holding the amount to send, in whole tokens.
    #[clap(long, default_value = DEFAULT_LIST_AMOUNT_FIELD)]
    pub amount_field: String,

    /// Name under which transfers are recorded in the ledger.
    #[clap(long, default_value = DEFAULT_TRANSFER_ACTION)]
    pub action: String,

    /// Token to send. Defaults to the L2 `ProxyERC20` (SNX) of the deployment.
    #[clap(long)]
    pub token: Option<Address>,

    #[clap(flatten)]
    pub deployment: DeploymentArgs,

    #[clap(flatten)]
    pub write: WriteArgs,
}

#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct EscrowMigrationCmd {
    /// JSON array of objects naming the escrow holders to migrate.
    #[clap(long, value_parser = parsing::parse_path)]
    pub account_json: PathBuf,

    /// Field of a list entry holding the account.
    #[clap(long, default_value = DEFAULT_MIGRATION_ADDRESS_FIELD)]
    pub address_field: String,

    /// Escrow migrated from. Defaults to `RewardEscrow` of the L1 deployment.
    #[clap(long)]
    pub reward_escrow: Option<Address>,

    /// Escrow migrated to. Defaults to `RewardEscrowV2` of the L1 deployment.
    #[clap(long)]
    pub reward_escrow_v2: Option<Address>,

    /// Accounts per `migrateAccountEscrowBalances` transaction.
    #[clap(long, default_value_t = DEFAULT_MIGRATION_BATCH_SIZE)]
    pub batch_size: usize,

    /// Vesting entries per `importVestingSchedule` transaction. The entries of one account are
    /// never split, so an account with more entries gets a transaction of its own.
    #[clap(long, default_value_t = DEFAULT_VESTING_IMPORT_BATCH_SIZE)]
    pub vesting_batch_size: usize,

    /// Stop after migrating balances, without importing vesting entries.
    #[clap(long)]
    pub skip_vesting_import: bool,

    #[clap(flatten)]
    pub deployment: DeploymentArgs,

    #[clap(flatten)]
    pub write: WriteArgs,
}

#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct IssuerBalancesCmd {
    /// Issuers need strictly more than this much sUSD to be recorded.
    #[clap(long, default_value = DEFAULT_MIN_ISSUER_BALANCE, value_parser = parsing::parse_ether)]
    pub minimum_balance: Amount,

    #[clap(flatten)]
    pub deployment: DeploymentArgs,

    #[clap(flatten)]
    pub scan: ScanArgs,
}

#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct DebtsCmd {
    /// Address of the debt share contract.
    #[clap(long, default_value = DEFAULT_DEBT_SHARE_ADDRESS)]
    pub address: Address,

    /// Block in which the contract was deployed.
    #[clap(long, default_value_t = DEFAULT_DEBT_SHARE_DEPLOYED_BLOCK)]
    pub deployed_block: u64,

    /// Block at which transfers are scanned up to and balances are read. Pinned in the ledger
    /// by the first run; defaults to a few blocks behind the chain head.
    #[clap(long)]
    pub latest_block: Option<u64>,

    /// Number of balance reads in flight.
    #[clap(long, default_value_t = DEFAULT_READ_CONCURRENCY)]
    pub concurrency: usize,

    /// Number of blocks covered by one `eth_getLogs` request.
    #[clap(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u64,
}

#[derive(Clone, Eq, PartialEq, Debug, Args)]
pub struct RevertReasonCmd {
    /// Hash of the transaction that reverted.
    #[clap(long)]
    pub tx_hash: TxHash,
}
