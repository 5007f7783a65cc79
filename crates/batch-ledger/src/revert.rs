//! Recovering human-readable revert reasons.

use alloy_primitives::{Bytes, TxHash};
use alloy_rpc_types::{BlockId, BlockNumberOrTag, TransactionRequest};
use snx_contract::{ChainClient, ChainError, Receipt};
use tracing::{debug, warn};

use crate::{BatchError, BatchResult};

/// `Error(string)` return data: 4-byte selector, offset word, length word, then the message.
const MESSAGE_OFFSET: usize = 4 + 32 + 32;
/// Bytes per decoding attempt when the message spans several words.
const CHUNK_SIZE: usize = 31;

/// Decode the reason out of revert return data.
///
/// A message that fits one word is read as a NUL-padded string. Longer messages are decoded in
/// 31-byte chunks; chunks that are not valid UTF-8 are skipped.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let message = data.get(MESSAGE_OFFSET..)?;
    if message.len() == 32 {
        if let Some(reason) = parse_bytes32_string(message) {
            return Some(reason);
        }
    }

    let reason = message
        .chunks(CHUNK_SIZE)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect::<String>()
        .replace('\0', "");
    (!reason.is_empty()).then_some(reason)
}

/// A 32-byte word holding a string terminated by at least one NUL byte.
fn parse_bytes32_string(word: &[u8]) -> Option<String> {
    if word.last() != Some(&0) {
        return None;
    }
    let end = word.iter().position(|byte| *byte == 0).unwrap_or(word.len());
    std::str::from_utf8(&word[..end])
        .ok()
        .filter(|reason| !reason.is_empty())
        .map(str::to_string)
}

/// Replay `request` as a call at `block` and decode whatever it reverts with.
///
/// `Ok(None)` means the replay produced no readable reason. Node failures are errors.
pub async fn replay_for_reason<C: ChainClient>(
    chain: &C,
    request: &TransactionRequest,
    block: BlockId,
) -> BatchResult<Option<String>> {
    let data: Bytes = match chain.call(request, block).await {
        Ok(output) => output,
        Err(ChainError::Reverted { data }) => data,
        Err(e) => return Err(e.into()),
    };
    debug!(%data, "Replayed transaction");
    Ok(decode_revert_reason(&data))
}

/// What could be found out about a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevertDiagnosis {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub receipt: Option<Receipt>,
    pub reason: Option<String>,
}

/// Fetch the transaction `tx_hash`, replay it at its block and decode the revert reason.
pub async fn diagnose_revert<C: ChainClient>(
    chain: &C,
    tx_hash: TxHash,
) -> BatchResult<RevertDiagnosis> {
    let transaction = chain
        .get_transaction(tx_hash)
        .await?
        .ok_or_else(|| BatchError::InvalidInput(format!("Transaction {tx_hash} not found")))?;
    let receipt = chain.get_transaction_receipt(tx_hash).await?;
    if receipt.is_some_and(|receipt| receipt.success) {
        warn!(%tx_hash, "Transaction did not revert, replaying anyway");
    }

    let block = match transaction.block_number {
        Some(number) => BlockId::number(number),
        None => BlockId::Number(BlockNumberOrTag::Latest),
    };
    let reason = replay_for_reason(chain, &transaction.request, block).await?;
    Ok(RevertDiagnosis {
        tx_hash,
        block_number: transaction.block_number,
        receipt,
        reason,
    })
}
