//! Chain access for the Synthetix batch jobs: contract bindings, provider construction and the
//! [`ChainClient`] seam through which every job talks to a node.

pub use alloy_primitives;
use alloy_primitives::Bytes;
use alloy_signer_local::LocalSignerError;
use alloy_transport::TransportError;
pub use client::{AlloyChainClient, BlockInfo, ChainClient, MinedTransaction, Receipt};
pub use types::*;

mod client;
pub mod deployment;
pub mod events;
pub mod providers;
mod types;

/// Errors that can occur when talking to a node.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Couldn't create connection: {0:?}")]
    Provider(TransportError),
    #[error("RPC request failed: {0}")]
    Rpc(TransportError),
    #[error("Call reverted with data {data}")]
    Reverted { data: Bytes },
    #[error("Couldn't decode contract data: {0}")]
    Decode(#[from] alloy_sol_types::Error),
    #[error("Invalid signer: {0:?}")]
    InvalidSigner(LocalSignerError),
    #[error("Deployment registry error: {0}")]
    Deployment(String),
    #[error("Couldn't read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Other error: {0}")]
    Other(String),
}

impl From<&str> for ChainError {
    fn from(e: &str) -> Self {
        ChainError::Other(e.to_string())
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
