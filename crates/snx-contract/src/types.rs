use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};

use crate::ChainResult;

/// Synthetix tokens (SNX, synths, WETH on L2) all use 18 decimals.
pub const TOKEN_DECIMALS: u8 = 18;

sol! {
    #[sol(all_derives = true)]
    #[derive(Debug, PartialEq, Eq)]
    contract ERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);

        function balanceOf(address account) external view returns (uint256);

        function transfer(address recipient, uint256 amount) external returns (bool);
    }
}

sol! {
    #[sol(all_derives = true)]
    #[derive(Debug, PartialEq, Eq)]
    contract RewardEscrow {
        function balanceOf(address account) external view returns (uint256);

        function totalEscrowedAccountBalance(address account) external view returns (uint256);

        function totalVestedAccountBalance(address account) external view returns (uint256);
    }
}

sol! {
    /// Flattened `(timestamp, amount)` pairs of the first escrow version, zero-padded. Kept apart
    /// from [`RewardEscrow`]: arrays this long have no `Default`.
    #[derive(Debug, PartialEq, Eq)]
    contract RewardEscrowSchedule {
        function checkAccountSchedule(address account) external view returns (uint256[520]);
    }
}

sol! {
    #[sol(all_derives = true)]
    #[derive(Debug, PartialEq, Eq)]
    contract RewardEscrowV2 {
        function totalBalancePendingMigration(address account) external view returns (uint256);

        function totalEscrowedAccountBalance(address account) external view returns (uint256);

        function numVestingEntries(address account) external view returns (uint256);

        function migrateAccountEscrowBalances(
            address[] accounts,
            uint256[] escrowBalances,
            uint256[] vestedBalances
        ) external;

        function importVestingSchedule(
            address[] accounts,
            uint256[] vestingTimestamps,
            uint256[] escrowAmounts
        ) external;
    }
}

sol! {
    #[sol(all_derives = true)]
    #[derive(Debug, PartialEq, Eq)]
    contract Synth {
        event Issued(address indexed account, uint256 value);
    }
}

sol! {
    /// First version of the L1 -> L2 bridge (`0x045e…a8d6`).
    #[sol(all_derives = true)]
    #[derive(Debug, PartialEq, Eq)]
    contract LegacyBridgeToOptimism {
        struct VestingEntry {
            uint64 endTime;
            uint256 escrowAmount;
        }

        event Deposit(address indexed account, uint256 amount);

        event ExportedVestingEntries(
            address indexed account,
            uint256 escrowedAccountBalance,
            VestingEntry[] vestingEntries
        );
    }
}

sol! {
    /// Second version of the L1 -> L2 bridge (`0xCd9D…5068`).
    #[sol(all_derives = true)]
    #[derive(Debug, PartialEq, Eq)]
    contract SynthetixBridgeToOptimism {
        struct VestingEntry {
            uint64 endTime;
            uint256 escrowAmount;
        }

        event DepositInitiated(address indexed _from, address _to, uint256 _amount);

        event ExportedVestingEntries(
            address indexed account,
            uint256 escrowedAccountBalance,
            VestingEntry[] vestingEntries
        );
    }
}

sol! {
    #[sol(all_derives = true)]
    #[derive(Debug, PartialEq, Eq)]
    contract SynthetixBridgeToBase {
        event WithdrawalInitiated(address indexed account, uint256 amount);
    }
}

/// A read-only call returning a single token amount for one account (`balanceOf`-like).
pub trait AmountCall: SolCall + Send + Sync {
    fn for_account(account: Address) -> Self;

    fn unwrap_amount(out: Self::Return) -> U256;

    /// Decode raw `eth_call` output into the amount.
    fn decode_amount(data: &[u8]) -> ChainResult<U256> {
        Ok(Self::unwrap_amount(Self::abi_decode_returns(data, true)?))
    }
}

macro_rules! impl_amount_call {
    ($call:ty, $ret:ty) => {
        impl AmountCall for $call {
            fn for_account(account: Address) -> Self {
                Self { account }
            }

            fn unwrap_amount(out: $ret) -> U256 {
                out._0
            }
        }
    };
}

impl_amount_call!(ERC20::balanceOfCall, ERC20::balanceOfReturn);
impl_amount_call!(RewardEscrow::balanceOfCall, RewardEscrow::balanceOfReturn);
impl_amount_call!(
    RewardEscrow::totalEscrowedAccountBalanceCall,
    RewardEscrow::totalEscrowedAccountBalanceReturn
);
impl_amount_call!(
    RewardEscrow::totalVestedAccountBalanceCall,
    RewardEscrow::totalVestedAccountBalanceReturn
);
impl_amount_call!(
    RewardEscrowV2::totalBalancePendingMigrationCall,
    RewardEscrowV2::totalBalancePendingMigrationReturn
);
impl_amount_call!(
    RewardEscrowV2::totalEscrowedAccountBalanceCall,
    RewardEscrowV2::totalEscrowedAccountBalanceReturn
);
impl_amount_call!(
    RewardEscrowV2::numVestingEntriesCall,
    RewardEscrowV2::numVestingEntriesReturn
);
