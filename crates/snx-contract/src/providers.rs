use std::str::FromStr;

use alloy_network::{Ethereum, EthereumWallet, Network};
use alloy_provider::{
    fillers::{FillerControlFlow, TxFiller, WalletFiller},
    Provider, ProviderBuilder, SendableTx,
};
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::{Transport, TransportResult};

use crate::{ChainError, ChainResult};

/// Creates a provider for the given RPC URL. This is a simple provider, without any fillers or
/// signer configuration. It is suitable for doing read-only operations.
///
/// The URL is taken by value so that the provider does not borrow from the caller and can be
/// shared with spawned tasks.
pub async fn create_simple_provider(rpc_url: String) -> ChainResult<impl Provider + Clone> {
    ProviderBuilder::new()
        .on_builtin(&rpc_url)
        .await
        .map_err(ChainError::Provider)
}

/// Creates a provider for the given RPC URL, with the given signer. This provider is suitable for
/// doing write operations, as it will sign transactions with the given signer.
///
/// Note: the nonce is fetched before every transaction. The batch jobs submit strictly one
/// transaction at a time, so there is no local nonce cache to go stale between runs.
pub async fn create_provider_with_signer(
    rpc_url: String,
    signer: PrivateKeySigner,
) -> ChainResult<impl Provider + Clone> {
    ProviderBuilder::new()
        .with_recommended_fillers()
        .filler(WalletFiller::new(EthereumWallet::from(signer)))
        .filler(LoggingFiller::default())
        .on_builtin(&rpc_url)
        .await
        .map_err(ChainError::Provider)
}

/// Parse a hex private key (with or without the `0x` prefix).
pub fn parse_signer(private_key: &str) -> ChainResult<PrivateKeySigner> {
    PrivateKeySigner::from_str(private_key.trim()).map_err(ChainError::InvalidSigner)
}

/// A noop filler that reports transaction details once it is prepared, just before sending.
#[derive(Copy, Clone, Debug, Default)]
pub struct LoggingFiller {}

impl TxFiller for LoggingFiller {
    type Fillable = ();

    fn status(&self, _tx: &<Ethereum as Network>::TransactionRequest) -> FillerControlFlow {
        FillerControlFlow::Finished
    }

    fn fill_sync(&self, tx: &mut SendableTx<Ethereum>) {
        match tx {
            SendableTx::Builder(tx) => {
                tracing::debug!(
                    sender = ?tx.from,
                    to = ?tx.to,
                    nonce = tx.nonce,
                    gas_price = tx.gas_price,
                    "Sending a transaction"
                );
            }
            SendableTx::Envelope(_) => {}
        }
    }

    async fn prepare<P: Provider<T, Ethereum>, T: Transport + Clone>(
        &self,
        _provider: &P,
        _tx: &<Ethereum as Network>::TransactionRequest,
    ) -> TransportResult<Self::Fillable> {
        Ok(())
    }

    async fn fill(
        &self,
        _fillable: Self::Fillable,
        tx: SendableTx<Ethereum>,
    ) -> TransportResult<SendableTx<Ethereum>> {
        Ok(tx)
    }
}
