use alloy_provider::Provider;
use alloy_signer_local::PrivateKeySigner;
use anyhow::Result;
use snx_contract::{
    providers::{create_provider_with_signer, create_simple_provider},
    AlloyChainClient,
};
use tracing::info;

pub async fn read_only_client(rpc_url: String) -> Result<AlloyChainClient<impl Provider + Clone>> {
    info!(rpc_url = %rpc_url, "Connecting (read-only)");
    let provider = create_simple_provider(rpc_url).await?;
    Ok(AlloyChainClient::read_only(provider))
}

pub async fn signing_client(
    rpc_url: String,
    signer: PrivateKeySigner,
) -> Result<AlloyChainClient<impl Provider + Clone>> {
    let address = signer.address();
    info!(rpc_url = %rpc_url, signer = %address, "Connecting");
    let provider = create_provider_with_signer(rpc_url, signer).await?;
    Ok(AlloyChainClient::with_signer(provider, address))
}
