use std::{future::Future, sync::Arc};

use alloy_json_rpc::RpcError;
use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, Bytes, TxHash};
use alloy_provider::Provider;
use alloy_rpc_types::{
    BlockId, BlockNumberOrTag, BlockTransactionsKind, Filter, Log, TransactionRequest,
};

use crate::{ChainError, ChainResult};

/// Outcome of a mined transaction, as far as the batch jobs care.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: u64,
}

/// A transaction fetched by hash, turned back into a request so that it can be replayed as a
/// call.
#[derive(Clone, Debug)]
pub struct MinedTransaction {
    pub request: TransactionRequest,
    pub block_number: Option<u64>,
}

/// Everything the batch jobs need from a node.
///
/// The production implementation is [`AlloyChainClient`]; tests provide in-memory doubles.
pub trait ChainClient: Send + Sync {
    /// Fetch logs matching `filter`.
    fn get_logs(&self, filter: &Filter) -> impl Future<Output = ChainResult<Vec<Log>>> + Send;

    /// Execute a read-only call at `block`. A revert carrying data is reported as
    /// [`ChainError::Reverted`].
    fn call(
        &self,
        request: &TransactionRequest,
        block: BlockId,
    ) -> impl Future<Output = ChainResult<Bytes>> + Send;

    /// Sign and broadcast `request`. Returns as soon as the node accepted the transaction.
    fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> impl Future<Output = ChainResult<TxHash>> + Send;

    fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = ChainResult<Option<Receipt>>> + Send;

    fn get_transaction(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = ChainResult<Option<MinedTransaction>>> + Send;

    fn get_block(&self, block: BlockNumberOrTag)
        -> impl Future<Output = ChainResult<BlockInfo>> + Send;

    /// Address used for signing, if the client can sign at all.
    fn signer_address(&self) -> Option<Address>;
}

/// [`ChainClient`] backed by an alloy provider.
#[derive(Clone)]
pub struct AlloyChainClient<P> {
    provider: P,
    signer: Option<Address>,
}

impl<P: Provider + Clone> AlloyChainClient<P> {
    /// Client for read-only jobs.
    pub fn read_only(provider: P) -> Self {
        Self {
            provider,
            signer: None,
        }
    }

    /// Client whose provider signs with the key behind `signer`.
    pub fn with_signer(provider: P, signer: Address) -> Self {
        Self {
            provider,
            signer: Some(signer),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: Provider + Clone> ChainClient for AlloyChainClient<P> {
    async fn get_logs(&self, filter: &Filter) -> ChainResult<Vec<Log>> {
        self.provider.get_logs(filter).await.map_err(ChainError::Rpc)
    }

    async fn call(&self, request: &TransactionRequest, block: BlockId) -> ChainResult<Bytes> {
        match self.provider.call(request).block(block).await {
            Ok(output) => Ok(output),
            Err(RpcError::ErrorResp(payload)) => match payload.as_revert_data() {
                Some(data) => Err(ChainError::Reverted { data }),
                None => Err(ChainError::Rpc(RpcError::ErrorResp(payload))),
            },
            Err(err) => Err(ChainError::Rpc(err)),
        }
    }

    async fn send_transaction(&self, request: TransactionRequest) -> ChainResult<TxHash> {
        let request = match self.signer {
            Some(signer) => request.with_from(signer),
            None => return Err("Client has no signer configured".into()),
        };
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(ChainError::Rpc)?;
        Ok(*pending.tx_hash())
    }

    async fn get_transaction_receipt(&self, hash: TxHash) -> ChainResult<Option<Receipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(ChainError::Rpc)?;
        Ok(receipt.map(|receipt| Receipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            success: receipt.status(),
        }))
    }

    async fn get_transaction(&self, hash: TxHash) -> ChainResult<Option<MinedTransaction>> {
        let transaction = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(ChainError::Rpc)?;
        Ok(transaction.map(|transaction| {
            let block_number = transaction.block_number;
            MinedTransaction {
                request: transaction.into(),
                block_number,
            }
        }))
    }

    async fn get_block(&self, block: BlockNumberOrTag) -> ChainResult<BlockInfo> {
        let block = self
            .provider
            .get_block_by_number(block, BlockTransactionsKind::Hashes)
            .await
            .map_err(ChainError::Rpc)?
            .ok_or_else(|| ChainError::Other(format!("Block {block} not found")))?;
        Ok(BlockInfo {
            number: block.header.number,
            timestamp: block.header.timestamp,
        })
    }

    fn signer_address(&self) -> Option<Address> {
        self.signer
    }
}

impl<C: ChainClient> ChainClient for Arc<C> {
    fn get_logs(&self, filter: &Filter) -> impl Future<Output = ChainResult<Vec<Log>>> + Send {
        (**self).get_logs(filter)
    }

    fn call(
        &self,
        request: &TransactionRequest,
        block: BlockId,
    ) -> impl Future<Output = ChainResult<Bytes>> + Send {
        (**self).call(request, block)
    }

    fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> impl Future<Output = ChainResult<TxHash>> + Send {
        (**self).send_transaction(request)
    }

    fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = ChainResult<Option<Receipt>>> + Send {
        (**self).get_transaction_receipt(hash)
    }

    fn get_transaction(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = ChainResult<Option<MinedTransaction>>> + Send {
        (**self).get_transaction(hash)
    }

    fn get_block(
        &self,
        block: BlockNumberOrTag,
    ) -> impl Future<Output = ChainResult<BlockInfo>> + Send {
        (**self).get_block(block)
    }

    fn signer_address(&self) -> Option<Address> {
        (**self).signer_address()
    }
}
