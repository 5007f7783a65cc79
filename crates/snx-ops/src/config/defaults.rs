use batch_ledger::executor::DEFAULT_CONFIRMATION_TIMEOUT;

use crate::config::LoggingFormat;

pub const DEFAULT_LOGGING_FORMAT: LoggingFormat = LoggingFormat::Text;
pub const DEFAULT_LOCAL_PROVIDER_URL: &str = "http://localhost:8545";
pub const DEFAULT_DEPLOYMENT_DIR: &str = "publish/deployed";
pub const DEFAULT_DATA_DIR: &str = "data";

pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = DEFAULT_CONFIRMATION_TIMEOUT.as_secs();

pub const DEFAULT_TOTAL_REWARDS: &str = "200000"; // SNX
pub const DEFAULT_REWARD_WEIGHT: &str = "escrowed";
pub const DEFAULT_DISTRIBUTION_ACTION: &str = "distribute";

pub const DEFAULT_AMOUNT_TO_DROP: &str = "0.05"; // WETH
pub const DEFAULT_ELIGIBILITY_AMOUNT: &str = "SNX";
pub const DEFAULT_MIN_ELIGIBLE_BALANCE: &str = "1"; // SNX, exclusive
pub const DEFAULT_AIRDROP_ACTION: &str = "airdrop";

pub const DEFAULT_LIST_ADDRESS_FIELD: &str = "Wallet address";
pub const DEFAULT_LIST_AMOUNT_FIELD: &str = "SNX to pay";
pub const DEFAULT_TRANSFER_ACTION: &str = "transfer";

pub const DEFAULT_MIGRATION_ADDRESS_FIELD: &str = "address";
pub const DEFAULT_MIGRATION_BATCH_SIZE: usize = 500;
pub const DEFAULT_VESTING_IMPORT_BATCH_SIZE: usize = 200;

pub const DEFAULT_MIN_ISSUER_BALANCE: &str = "1"; // sUSD, exclusive

/// `SynthetixDebtShare` on mainnet.
pub const DEFAULT_DEBT_SHARE_ADDRESS: &str = "0x89FCb32F29e509cc42d0C8b6f058C993013A843F";
pub const DEFAULT_DEBT_SHARE_DEPLOYED_BLOCK: u64 = 14_169_250;
/// Distance kept from the chain head when no upper block is given, to stay clear of reorgs.
pub const DEFAULT_HEAD_MARGIN: u64 = 10;
