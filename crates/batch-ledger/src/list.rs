//! Operator-supplied account lists, for jobs that act on a fixed set of accounts instead of
//! enumerating them from events.
//!
//! A list is a JSON array of objects. One field holds the account, an optional other one the
//! amount to act with (a JSON number or a decimal string, in whole tokens):
//!
//! ```json
//! [{ "Wallet address": "0x1234…", "SNX to pay": 50.04962378 }]
//! ```

use std::{collections::HashSet, fs, path::Path};

use alloy_primitives::Address;
use serde_json::{Map, Value};
use snx_contract::providers::parse_signer;
use tracing::{info, warn};

use crate::{parse_account, Amount, BatchError, BatchResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEntry {
    pub account: Address,
    pub amount: Option<Amount>,
}

/// Valid entries in file order, plus the raw entries that had to be left out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountList {
    pub entries: Vec<ListEntry>,
    pub invalid: Vec<String>,
}

impl AccountList {
    pub fn accounts(&self) -> impl Iterator<Item = Address> + '_ {
        self.entries.iter().map(|entry| entry.account)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load the list at `path`, taking the account from `address_field` and, when given, the amount
/// from `amount_field`.
///
/// Entries with a malformed account or amount, and repeated accounts, are logged and left out
/// rather than failing the whole list. A file that is not an array of objects is an error.
pub fn load_account_list(
    path: &Path,
    address_field: &str,
    amount_field: Option<&str>,
) -> BatchResult<AccountList> {
    let content = fs::read_to_string(path).map_err(|e| {
        BatchError::InvalidInput(format!("Couldn't read account list {}: {e}", path.display()))
    })?;
    let raw_entries: Vec<Map<String, Value>> = serde_json::from_str(&content).map_err(|e| {
        BatchError::InvalidInput(format!(
            "Account list {} is not an array of objects: {e}",
            path.display()
        ))
    })?;

    let mut list = AccountList::default();
    let mut seen = HashSet::new();
    for (index, raw) in raw_entries.iter().enumerate() {
        let position = format!("{}/{}", index + 1, raw_entries.len());
        match parse_entry(raw, address_field, amount_field) {
            Ok(entry) if seen.insert(entry.account) => list.entries.push(entry),
            Ok(entry) => {
                warn!(account = %entry.account, position = %position, "Repeated account, ignoring");
                list.invalid.push(Value::Object(raw.clone()).to_string());
            }
            Err(e) => {
                warn!(position = %position, error = %e, "Invalid list entry");
                if let Some(hint) = raw.get(address_field).and_then(address_of_key) {
                    warn!(
                        position = %position,
                        "This looks like a private key, did you mean {hint}?"
                    );
                }
                list.invalid.push(Value::Object(raw.clone()).to_string());
            }
        }
    }
    info!(
        path = %path.display(),
        entries = list.len(),
        invalid = list.invalid.len(),
        "Loaded account list"
    );
    Ok(list)
}

fn parse_entry(
    raw: &Map<String, Value>,
    address_field: &str,
    amount_field: Option<&str>,
) -> BatchResult<ListEntry> {
    let account = match raw.get(address_field) {
        Some(Value::String(address)) => parse_account(address)?,
        _ => {
            return Err(BatchError::InvalidInput(format!(
                "`{address_field}` is missing or not a string"
            )))
        }
    };
    let amount = amount_field
        .map(|field| match raw.get(field) {
            Some(Value::Number(number)) => Amount::from_ether(&number.to_string()),
            Some(Value::String(amount)) => Amount::from_ether(amount.trim()),
            _ => Err(BatchError::InvalidInput(format!(
                "`{field}` of {account} is missing or not an amount"
            ))),
        })
        .transpose()?;
    Ok(ListEntry { account, amount })
}

/// The address controlled by `value`, if it is a private key pasted where an address belongs.
fn address_of_key(value: &Value) -> Option<Address> {
    let raw = value.as_str()?;
    parse_signer(raw).ok().map(|signer| signer.address())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use assert2::{assert, let_assert};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn write_list(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("list.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[rstest]
    fn amounts_may_be_numbers_or_strings(dir: TempDir) {
        let path = write_list(
            &dir,
            r#"[
                { "Wallet address": "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", "SNX to pay": 50.04962378 },
                { "Wallet address": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", "SNX to pay": "2" }
            ]"#,
        );

        let list = load_account_list(&path, "Wallet address", Some("SNX to pay")).unwrap();

        assert!(list.invalid.is_empty());
        assert!(
            list.entries
                == vec![
                    ListEntry {
                        account: address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
                        amount: Some(Amount::from_ether("50.04962378").unwrap()),
                    },
                    ListEntry {
                        account: address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"),
                        amount: Some(Amount::from_ether("2").unwrap()),
                    },
                ]
        );
    }

    #[rstest]
    fn malformed_and_repeated_entries_are_left_out(dir: TempDir) {
        let private_key = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
        let path = write_list(
            &dir,
            &format!(
                r#"[
                    {{ "address": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa" }},
                    {{ "address": "{private_key}" }},
                    {{ "address": "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA" }},
                    {{ "account": "0xcccccccccccccccccccccccccccccccccccccccc" }}
                ]"#
            ),
        );

        let list = load_account_list(&path, "address", None).unwrap();

        assert!(
            list.accounts().collect::<Vec<_>>()
                == vec![address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")]
        );
        assert!(list.entries[0].amount.is_none());
        assert!(list.invalid.len() == 3);
        assert!(address_of_key(&Value::from(private_key)).is_some());
    }

    #[rstest]
    fn missing_amount_invalidates_the_entry(dir: TempDir) {
        let path = write_list(
            &dir,
            r#"[{ "Wallet address": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa" },
                { "Wallet address": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", "SNX to pay": "-1" }]"#,
        );

        let list = load_account_list(&path, "Wallet address", Some("SNX to pay")).unwrap();

        assert!(list.is_empty());
        assert!(list.invalid.len() == 2);
    }

    #[rstest]
    fn list_must_be_an_array_of_objects(dir: TempDir) {
        let path = write_list(&dir, r#"{ "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa": "1" }"#);

        let result = load_account_list(&path, "address", None);

        let_assert!(Err(BatchError::InvalidInput(_)) = result);
    }

    #[rstest]
    fn missing_list_is_an_error(dir: TempDir) {
        assert!(load_account_list(&dir.path().join("absent.json"), "address", None).is_err());
    }
}
