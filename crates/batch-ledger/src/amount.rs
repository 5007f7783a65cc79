use std::{fmt, str::FromStr};

use alloy_primitives::{
    utils::{format_ether, parse_units, ParseUnits},
    U256,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{BatchError, BatchResult};

/// A token quantity in base units (wei).
///
/// Serialised as a decimal string so that values beyond 2^53 survive any JSON tooling.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Amount = Amount(U256::ZERO);

    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parse a human-readable ether amount (`"1.5"`) into base units.
    pub fn from_ether(value: &str) -> BatchResult<Self> {
        Self::from_units(value, "ether")
    }

    /// Parse a gwei amount (`"2.5"`), as used for gas prices, into wei.
    pub fn from_gwei(value: &str) -> BatchResult<Self> {
        Self::from_units(value, "gwei")
    }

    fn from_units(value: &str, unit: &str) -> BatchResult<Self> {
        match parse_units(value, unit) {
            Ok(ParseUnits::U256(units)) => Ok(Self(units)),
            Ok(ParseUnits::I256(_)) => Err(BatchError::InvalidInput(format!(
                "`{value}` is negative"
            ))),
            Err(e) => Err(BatchError::InvalidInput(format!(
                "`{value}` is not an amount of {unit}: {e}"
            ))),
        }
    }

    pub fn to_ether_string(&self) -> String {
        format_ether(self.0)
    }

    pub fn checked_add(self, other: Amount) -> BatchResult<Amount> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| BatchError::Overflow(format!("{self} + {other}")))
    }

    pub fn checked_sub(self, other: Amount) -> BatchResult<Amount> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or_else(|| BatchError::Overflow(format!("{self} - {other}")))
    }

    pub fn checked_mul(self, other: U256) -> BatchResult<Amount> {
        self.0
            .checked_mul(other)
            .map(Self)
            .ok_or_else(|| BatchError::Overflow(format!("{self} * {other}")))
    }

    /// `self / divisor`, truncating. Division by zero is rejected as invalid input.
    pub fn checked_div(self, divisor: U256) -> BatchResult<Amount> {
        self.0
            .checked_div(divisor)
            .map(Self)
            .ok_or_else(|| BatchError::InvalidInput(format!("Division of {self} by zero")))
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Self(self.0.saturating_sub(other.0))
    }

    /// Sum `amounts`, failing on overflow.
    pub fn sum<'a>(amounts: impl IntoIterator<Item = &'a Amount>) -> BatchResult<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(*amount))
    }
}

impl From<U256> for Amount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<Amount> for U256 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = BatchError;

    /// Only plain base-10 digits are accepted: no sign, no exponent, no hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BatchError::InvalidInput(format!(
                "`{s}` is not a decimal base-unit amount"
            )));
        }
        U256::from_str_radix(s, 10)
            .map(Self)
            .map_err(|e| BatchError::InvalidInput(format!("`{s}` does not fit in 256 bits: {e}")))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
