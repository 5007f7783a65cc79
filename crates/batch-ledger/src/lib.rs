//! Resumable batch jobs over a JSON ledger.
//!
//! A job enumerates candidate accounts from event logs ([`enumerator`]) or takes them from an
//! operator-supplied [`list`], performs read or write actions for each of them ([`executor`],
//! [`pool`]) and records every result in a [`Ledger`] that is flushed to disk after each
//! account. Re-running a job with the same ledger file
//! resumes it: accounts already recorded, or already carrying an action's completion flag, are
//! skipped.

pub use amount::Amount;
pub use context::RunContext;
pub use error::{BatchError, BatchResult};
pub use ledger::{parse_account, AccountPatch, AccountRecord, Flag, Ledger, TotalDrift};
pub use store::{load, save, LedgerStore};

mod amount;
mod context;
pub mod distribution;
pub mod enumerator;
mod error;
pub mod executor;
mod ledger;
pub mod list;
pub mod pool;
pub mod revert;
mod store;
