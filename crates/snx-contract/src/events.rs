use alloy_primitives::{Address, B256};
use alloy_rpc_types::{Filter, Log};
use alloy_sol_types::SolEvent;

use crate::ChainResult;

/// Filter matching any of `signatures` emitted by `address` within `[from_block, to_block]`.
///
/// All signatures go into topic0 as alternatives, so a single `eth_getLogs` round trip returns
/// every event type of interest.
pub fn multi_event_filter(
    address: Address,
    signatures: Vec<B256>,
    from_block: u64,
    to_block: u64,
) -> Filter {
    Filter::new()
        .address(address)
        .event_signature(signatures)
        .from_block(from_block)
        .to_block(to_block)
}

/// Decode `log` as `Event`. The log's topic0 is expected to match `Event::SIGNATURE_HASH`.
pub fn decode_log<Event: SolEvent>(log: &Log) -> ChainResult<Event> {
    Ok(Event::decode_log_data(log.data(), true)?)
}
