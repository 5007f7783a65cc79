use std::path::PathBuf;

use alloy_primitives::{Address, TxHash};
use snx_contract::ChainError;

use crate::Amount;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Ledger file {path} is corrupt: {reason}")]
    CorruptLedger { path: PathBuf, reason: String },

    #[error("Registered deployments {registered:?} differ from the known list {expected:?}")]
    UnexpectedDeploymentSet {
        expected: Vec<Address>,
        registered: Vec<Address>,
    },

    #[error("RPC failure: {0}")]
    Rpc(#[from] ChainError),

    #[error("Transaction {tx_hash:?} for {account} reverted: {reason}")]
    Reverted {
        account: Address,
        tx_hash: Option<TxHash>,
        reason: String,
    },

    #[error("Signer holds {available} but {required} is needed for the batch")]
    InsufficientSignerBalance { required: Amount, available: Amount },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Couldn't persist ledger to {path}: {source}")]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Arithmetic overflow while computing {0}")]
    Overflow(String),
}

pub type BatchResult<T> = Result<T, BatchError>;
