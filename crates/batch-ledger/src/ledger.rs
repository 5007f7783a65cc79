//! The in-memory ledger: per-account records, their aggregate totals and pinned run
//! parameters.

use std::{collections::BTreeMap, str::FromStr};

use alloy_primitives::{hex, Address, TxHash};
use serde::{Deserialize, Serialize};

use crate::{Amount, BatchError, BatchResult};

/// A named boolean or string marker on an account (`distribute: true`, `distribute_tx: "0x…"`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Flag::Bool(value)
    }
}

impl From<String> for Flag {
    fn from(value: String) -> Self {
        Flag::Text(value)
    }
}

impl From<&str> for Flag {
    fn from(value: &str) -> Self {
        Flag::Text(value.to_string())
    }
}

impl From<TxHash> for Flag {
    fn from(value: TxHash) -> Self {
        Flag::Text(hex::encode_prefixed(value))
    }
}

/// Everything the jobs have learned or done for one account.
///
/// In the file a record is one flat object: amounts are decimal strings, flags are booleans or
/// any other string (`{"escrowed": "500", "distribute": true, "distribute_tx": "0x…"}`). A
/// name is either an amount or a flag, never both.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, RecordField>", into = "BTreeMap<String, RecordField>")]
pub struct AccountRecord {
    amounts: BTreeMap<String, Amount>,
    flags: BTreeMap<String, Flag>,
}

/// One value of a flat record. Digit-only strings are amounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum RecordField {
    Amount(Amount),
    Flag(Flag),
}

impl From<BTreeMap<String, RecordField>> for AccountRecord {
    fn from(fields: BTreeMap<String, RecordField>) -> Self {
        let mut record = AccountRecord::default();
        for (name, field) in fields {
            match field {
                RecordField::Amount(amount) => {
                    record.amounts.insert(name, amount);
                }
                RecordField::Flag(flag) => {
                    record.flags.insert(name, flag);
                }
            }
        }
        record
    }
}

impl From<AccountRecord> for BTreeMap<String, RecordField> {
    fn from(record: AccountRecord) -> Self {
        let amounts = record
            .amounts
            .into_iter()
            .map(|(name, amount)| (name, RecordField::Amount(amount)));
        let flags = record
            .flags
            .into_iter()
            .map(|(name, flag)| (name, RecordField::Flag(flag)));
        amounts.chain(flags).collect()
    }
}

impl AccountRecord {
    pub fn amount(&self, name: &str) -> Option<Amount> {
        self.amounts.get(name).copied()
    }

    pub fn amounts(&self) -> &BTreeMap<String, Amount> {
        &self.amounts
    }

    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.flags.get(name)
    }

    /// Whether the completion flag of `action` is set.
    pub fn is_complete(&self, action: &str) -> bool {
        self.flags.get(action) == Some(&Flag::Bool(true))
    }
}

/// Changes to merge into an account record. Named amounts overwrite, flags overwrite.
#[derive(Clone, Debug, Default)]
pub struct AccountPatch {
    amounts: BTreeMap<String, Amount>,
    flags: BTreeMap<String, Flag>,
}

impl AccountPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn amount(mut self, name: impl Into<String>, value: impl Into<Amount>) -> Self {
        self.amounts.insert(name.into(), value.into());
        self
    }

    pub fn flag(mut self, name: impl Into<String>, value: impl Into<Flag>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty() && self.flags.is_empty()
    }
}

/// A total whose stored value is not the sum of the matching account amounts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TotalDrift {
    pub name: String,
    pub stored: Amount,
    pub derived: Amount,
}

/// The whole persisted state of one job.
///
/// For every amount name `X`, `totals[X]` equals the sum of `X` over all accounts. Totals are
/// maintained incrementally by [`Ledger::upsert_account`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ledger {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    meta: BTreeMap<String, String>,
    #[serde(default)]
    totals: BTreeMap<String, Amount>,
    #[serde(default, with = "account_keys")]
    accounts: BTreeMap<Address, AccountRecord>,
}

impl Ledger {
    pub fn account(&self, address: &Address) -> Option<&AccountRecord> {
        self.accounts.get(address)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &AccountRecord)> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Whether `address` already carries the completion flag of `action`.
    pub fn is_complete(&self, address: &Address, action: &str) -> bool {
        self.accounts
            .get(address)
            .is_some_and(|record| record.is_complete(action))
    }

    pub fn total(&self, name: &str) -> Amount {
        self.totals.get(name).copied().unwrap_or_default()
    }

    pub fn totals(&self) -> &BTreeMap<String, Amount> {
        &self.totals
    }

    /// Make sure the total `name` is present in the file, even before any account has it.
    pub fn ensure_total(&mut self, name: &str) {
        self.totals.entry(name.to_string()).or_default();
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.insert(key.into(), value.into());
    }

    /// Record a run parameter, or check it against the value recorded by an earlier run.
    pub fn pin_meta(&mut self, key: &str, value: &str) -> BatchResult<()> {
        match self.meta.get(key) {
            Some(pinned) if pinned != value => Err(BatchError::InvalidInput(format!(
                "Ledger was produced with {key} = {pinned}, this run uses {value}"
            ))),
            Some(_) => Ok(()),
            None => {
                self.meta.insert(key.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    /// Merge `patch` into the record of `address`, creating it if needed, and adjust totals.
    ///
    /// Either the whole patch is applied or, on arithmetic overflow, nothing is.
    pub fn upsert_account(
        &mut self,
        address: Address,
        patch: AccountPatch,
    ) -> BatchResult<&AccountRecord> {
        let previous = self.accounts.get(&address);
        let clash = patch
            .amounts
            .keys()
            .find(|name| {
                patch.flags.contains_key(*name)
                    || previous.is_some_and(|record| record.flags.contains_key(*name))
            })
            .or_else(|| {
                patch
                    .flags
                    .keys()
                    .find(|name| previous.is_some_and(|record| record.amounts.contains_key(*name)))
            });
        if let Some(name) = clash {
            return Err(BatchError::InvalidInput(format!(
                "`{name}` of {address} cannot be both an amount and a flag"
            )));
        }

        let mut new_totals = Vec::with_capacity(patch.amounts.len());
        for (name, value) in &patch.amounts {
            let old = previous
                .and_then(|record| record.amount(name))
                .unwrap_or_default();
            let total = self
                .total(name)
                .checked_add(*value)?
                .checked_sub(old)
                .map_err(|_| {
                    BatchError::Overflow(format!("total `{name}` (stored total is below {old})"))
                })?;
            new_totals.push((name.clone(), total));
        }

        self.totals.extend(new_totals);
        let record = self.accounts.entry(address).or_default();
        record.amounts.extend(patch.amounts);
        record.flags.extend(patch.flags);
        Ok(record)
    }

    /// Totals recomputed from the account records.
    pub fn derived_totals(&self) -> BatchResult<BTreeMap<String, Amount>> {
        let mut totals = BTreeMap::<String, Amount>::new();
        for record in self.accounts.values() {
            for (name, value) in &record.amounts {
                let total = totals.entry(name.clone()).or_default();
                *total = total.checked_add(*value)?;
            }
        }
        Ok(totals)
    }

    /// Stored totals that disagree with [`Ledger::derived_totals`].
    pub fn drifted_totals(&self) -> BatchResult<Vec<TotalDrift>> {
        let derived = self.derived_totals()?;
        let mut names = self.totals.keys().chain(derived.keys()).collect::<Vec<_>>();
        names.sort();
        names.dedup();

        Ok(names
            .into_iter()
            .filter_map(|name| {
                let stored = self.total(name);
                let derived = derived.get(name).copied().unwrap_or_default();
                (stored != derived).then(|| TotalDrift {
                    name: name.clone(),
                    stored,
                    derived,
                })
            })
            .collect())
    }
}

/// Parse a user-supplied account address, in any letter case.
pub fn parse_account(raw: &str) -> BatchResult<Address> {
    Address::from_str(raw.trim())
        .map_err(|e| BatchError::InvalidInput(format!("`{raw}` is not an address: {e}")))
}

/// Accounts are keyed by lower-case `0x` addresses in the file.
mod account_keys {
    use std::{collections::BTreeMap, str::FromStr};

    use alloy_primitives::{hex, Address};
    use serde::{de, ser::SerializeMap, Deserialize, Deserializer, Serializer};

    use super::AccountRecord;

    pub fn serialize<S: Serializer>(
        accounts: &BTreeMap<Address, AccountRecord>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(accounts.len()))?;
        for (address, record) in accounts {
            map.serialize_entry(&hex::encode_prefixed(address), record)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Address, AccountRecord>, D::Error> {
        let raw = BTreeMap::<String, AccountRecord>::deserialize(deserializer)?;
        let mut accounts = BTreeMap::new();
        for (key, record) in raw {
            let address = Address::from_str(&key).map_err(de::Error::custom)?;
            if accounts.insert(address, record).is_some() {
                return Err(de::Error::custom(format!("Account {key} appears twice")));
            }
        }
        Ok(accounts)
    }
}
