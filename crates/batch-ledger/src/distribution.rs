//! Proportional split of a reward pool over escrowed balances.

use alloy_primitives::{Address, U256};

use crate::{Amount, BatchError, BatchResult, Ledger};

/// Fixed-point scale of the reward multiplier.
pub const PRECISION: u64 = 1_000_000;

/// `PRECISION * pool / total`, truncated.
pub fn reward_multiplier(pool: Amount, total: Amount) -> BatchResult<U256> {
    if total.is_zero() {
        return Err(BatchError::InvalidInput(
            "Cannot distribute over a zero total".into(),
        ));
    }
    Ok(pool
        .checked_mul(U256::from(PRECISION))?
        .checked_div(total.as_u256())?
        .as_u256())
}

/// `escrowed * multiplier / PRECISION`, truncated. Summed over accounts whose escrowed amounts
/// add up to `total`, the shares never exceed `pool`.
pub fn proportional_share(escrowed: Amount, pool: Amount, total: Amount) -> BatchResult<Amount> {
    let multiplier = reward_multiplier(pool, total)?;
    escrowed
        .checked_mul(multiplier)?
        .checked_div(U256::from(PRECISION))
}

/// Shares still to be paid out for one action.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistributionPlan {
    pub multiplier: U256,
    pub shares: Vec<(Address, Amount)>,
    pub total: Amount,
}

/// Compute the share of every account holding `weight` whose `action` is not complete yet.
///
/// The denominator is the ledger total of `weight`, so accounts already paid still count towards
/// it and a resumed run pays the same shares as an uninterrupted one.
pub fn plan_distribution(
    ledger: &Ledger,
    weight: &str,
    action: &str,
    pool: Amount,
) -> BatchResult<DistributionPlan> {
    let total_weight = ledger.total(weight);
    let multiplier = reward_multiplier(pool, total_weight)?;

    let mut plan = DistributionPlan {
        multiplier,
        ..Default::default()
    };
    for (address, record) in ledger.accounts() {
        let Some(escrowed) = record.amount(weight).filter(|amount| !amount.is_zero()) else {
            continue;
        };
        if record.is_complete(action) {
            continue;
        }
        let share = escrowed
            .checked_mul(multiplier)?
            .checked_div(U256::from(PRECISION))?;
        if share.is_zero() {
            continue;
        }
        plan.total = plan.total.checked_add(share)?;
        plan.shares.push((*address, share));
    }
    Ok(plan)
}
