//! Turning event logs of one or more contract deployments into the set of accounts a job
//! should process.

use std::collections::HashSet;

use alloy_primitives::{Address, TxHash, B256};
use alloy_rpc_types::{BlockNumberOrTag, Log};
use alloy_sol_types::SolEvent;
use snx_contract::{
    events::{decode_log, multi_event_filter},
    ChainClient, ChainError, ChainResult, ERC20,
};
use tracing::{debug, info};

use crate::{BatchError, BatchResult};

/// Default number of blocks covered by one `eth_getLogs` request.
pub const DEFAULT_PAGE_SIZE: u64 = 100_000;

/// Whether an event names a candidate on its own, or only when no primary event was emitted in
/// the same transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventRole {
    Primary,
    Secondary,
}

type TargetExtractor = Box<dyn Fn(&Log) -> ChainResult<Vec<Address>> + Send + Sync>;

/// One event type of interest and how to get the candidate accounts out of it.
pub struct EventTarget {
    name: &'static str,
    signature: B256,
    role: EventRole,
    extract: TargetExtractor,
}

impl EventTarget {
    pub fn new<Event: SolEvent + 'static>(
        role: EventRole,
        targets: fn(&Event) -> Vec<Address>,
    ) -> Self {
        Self {
            name: Event::SIGNATURE,
            signature: Event::SIGNATURE_HASH,
            role,
            extract: Box::new(move |log| decode_log::<Event>(log).map(|event| targets(&event))),
        }
    }

    pub fn primary<Event: SolEvent + 'static>(target: fn(&Event) -> Address) -> Self {
        Self::new_single(EventRole::Primary, target)
    }

    pub fn secondary<Event: SolEvent + 'static>(target: fn(&Event) -> Address) -> Self {
        Self::new_single(EventRole::Secondary, target)
    }

    fn new_single<Event: SolEvent + 'static>(
        role: EventRole,
        target: fn(&Event) -> Address,
    ) -> Self {
        Self {
            name: Event::SIGNATURE,
            signature: Event::SIGNATURE_HASH,
            role,
            extract: Box::new(move |log| decode_log::<Event>(log).map(|event| vec![target(&event)])),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// One contract deployment to scan.
pub struct EventSource {
    pub address: Address,
    pub from_block: u64,
    /// Inclusive upper bound. `None` means the chain head at the moment the scan starts.
    pub to_block: Option<u64>,
    pub events: Vec<EventTarget>,
}

impl EventSource {
    pub fn new(address: Address, from_block: u64) -> Self {
        Self {
            address,
            from_block,
            to_block: None,
            events: vec![],
        }
    }

    pub fn up_to(mut self, to_block: u64) -> Self {
        self.to_block = Some(to_block);
        self
    }

    pub fn with_event(mut self, target: EventTarget) -> Self {
        self.events.push(target);
        self
    }

    fn target_for(&self, log: &Log) -> Option<&EventTarget> {
        let topic0 = log.topics().first()?;
        self.events.iter().find(|target| target.signature == *topic0)
    }
}

/// A decoded log together with the accounts it names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedEvent {
    pub source: Address,
    pub event: &'static str,
    pub role: EventRole,
    pub targets: Vec<Address>,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub log_index: u64,
}

/// Lazy cursor over the events of one source, one block range per request. Not restartable:
/// once exhausted it stays exhausted.
pub struct EventScan<'a, C> {
    chain: &'a C,
    source: &'a EventSource,
    next_block: u64,
    to_block: u64,
    page_size: u64,
    exhausted: bool,
}

/// Start scanning `source`. The upper bound is resolved here, once.
pub async fn scan_events<'a, C: ChainClient>(
    chain: &'a C,
    source: &'a EventSource,
    page_size: u64,
) -> BatchResult<EventScan<'a, C>> {
    if page_size == 0 {
        return Err(BatchError::InvalidInput("Page size must be positive".into()));
    }
    if source.events.is_empty() {
        return Err(BatchError::InvalidInput(format!(
            "No events to scan for on {}",
            source.address
        )));
    }
    let to_block = match source.to_block {
        Some(to_block) => to_block,
        None => chain.get_block(BlockNumberOrTag::Latest).await?.number,
    };
    debug!(
        source = %source.address,
        from_block = source.from_block,
        to_block,
        "Starting event scan"
    );
    Ok(EventScan {
        chain,
        source,
        next_block: source.from_block,
        to_block,
        page_size,
        exhausted: source.from_block > to_block,
    })
}

impl<C: ChainClient> EventScan<'_, C> {
    /// Fetch and decode the next block range. `None` once the range is exhausted.
    pub async fn next_page(&mut self) -> Option<BatchResult<Vec<ParsedEvent>>> {
        if self.exhausted {
            return None;
        }
        let page_start = self.next_block;
        let page_end = page_start
            .saturating_add(self.page_size - 1)
            .min(self.to_block);
        self.exhausted = page_end == self.to_block;
        self.next_block = page_end.saturating_add(1);

        Some(self.fetch(page_start, page_end).await)
    }

    async fn fetch(&self, from_block: u64, to_block: u64) -> BatchResult<Vec<ParsedEvent>> {
        let signatures = self
            .source
            .events
            .iter()
            .map(|target| target.signature)
            .collect();
        let filter = multi_event_filter(self.source.address, signatures, from_block, to_block);
        let logs = self.chain.get_logs(&filter).await?;
        debug!(
            source = %self.source.address,
            from_block,
            to_block,
            logs = logs.len(),
            "Fetched logs"
        );

        let mut events = Vec::with_capacity(logs.len());
        for log in logs.iter().filter(|log| !log.removed) {
            let Some(target) = self.source.target_for(log) else {
                debug!(?log, "Skipping log of an event type that was not asked for");
                continue;
            };
            events.push(ParsedEvent {
                source: self.source.address,
                event: target.name,
                role: target.role,
                targets: (target.extract)(log)?,
                tx_hash: log.transaction_hash.ok_or_else(|| missing("transaction hash"))?,
                block_number: log.block_number.ok_or_else(|| missing("block number"))?,
                log_index: log.log_index.ok_or_else(|| missing("log index"))?,
            });
        }
        Ok(events)
    }

    /// Drain the cursor.
    pub async fn collect(mut self) -> BatchResult<Vec<ParsedEvent>> {
        let mut events = vec![];
        while let Some(page) = self.next_page().await {
            events.extend(page?);
        }
        Ok(events)
    }
}

fn missing(what: &str) -> ChainError {
    ChainError::Other(format!("Log returned by the node has no {what}"))
}

/// Ordered, duplicate-free accounts to act on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CandidateSet {
    ordered: Vec<Address>,
    seen: HashSet<Address>,
}

impl CandidateSet {
    /// Targets of `events` in event order. Secondary events that share a transaction with a
    /// primary event are dropped. The zero address (mint/burn counterparty) is never a candidate.
    pub fn from_events(events: &[ParsedEvent]) -> Self {
        let primary_transactions = events
            .iter()
            .filter(|event| event.role == EventRole::Primary)
            .map(|event| event.tx_hash)
            .collect::<HashSet<_>>();

        let mut candidates = Self::default();
        for event in events {
            if event.role == EventRole::Secondary && primary_transactions.contains(&event.tx_hash)
            {
                continue;
            }
            for target in &event.targets {
                candidates.insert(*target);
            }
        }
        candidates
    }

    /// Returns `false` if `address` was already present or is the zero address.
    pub fn insert(&mut self, address: Address) -> bool {
        if address == Address::ZERO || !self.seen.insert(address) {
            return false;
        }
        self.ordered.push(address);
        true
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn addresses(&self) -> &[Address] {
        &self.ordered
    }

    pub fn into_vec(self) -> Vec<Address> {
        self.ordered
    }
}

impl FromIterator<Address> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        let mut candidates = Self::default();
        for address in iter {
            candidates.insert(address);
        }
        candidates
    }
}

/// Scan every source and union their targets into one candidate set.
pub async fn collect_candidates<C: ChainClient>(
    chain: &C,
    sources: &[EventSource],
    page_size: u64,
) -> BatchResult<CandidateSet> {
    let mut events = vec![];
    for source in sources {
        let found = scan_events(chain, source, page_size).await?.collect().await?;
        for target in &source.events {
            info!(
                source = %source.address,
                event = target.name,
                count = found.iter().filter(|event| event.event == target.name).count(),
                "Events found"
            );
        }
        events.extend(found);
    }

    let candidates = CandidateSet::from_events(&events);
    info!(
        events = events.len(),
        candidates = candidates.len(),
        "Collected candidates"
    );
    Ok(candidates)
}

/// Fail unless the deployments recorded in the registry are exactly the ones the job knows how
/// to scan, in the same order.
pub fn verify_deployments(expected: &[Address], registered: &[Address]) -> BatchResult<()> {
    if expected != registered {
        return Err(BatchError::UnexpectedDeploymentSet {
            expected: expected.to_vec(),
            registered: registered.to_vec(),
        });
    }
    Ok(())
}

/// Event target selecting both parties of an ERC20 `Transfer`.
pub fn transfer_participants() -> EventTarget {
    EventTarget::new::<ERC20::Transfer>(EventRole::Primary, |transfer| {
        vec![transfer.from, transfer.to]
    })
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, B256};
    use assert2::assert;

    use super::*;

    const ALICE: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const BOB: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");

    fn event(role: EventRole, target: Address, tx: u8) -> ParsedEvent {
        ParsedEvent {
            source: Address::ZERO,
            event: "Event(address)",
            role,
            targets: vec![target],
            tx_hash: B256::repeat_byte(tx),
            block_number: 1,
            log_index: 0,
        }
    }

    #[test]
    fn secondary_event_in_a_primary_transaction_is_dropped() {
        let events = [
            event(EventRole::Primary, ALICE, 1),
            event(EventRole::Secondary, BOB, 1),
        ];

        assert!(CandidateSet::from_events(&events).addresses() == [ALICE]);
    }

    #[test]
    fn standalone_secondary_event_counts() {
        let events = [
            event(EventRole::Primary, ALICE, 1),
            event(EventRole::Secondary, BOB, 2),
            event(EventRole::Primary, ALICE, 3),
        ];

        assert!(CandidateSet::from_events(&events).addresses() == [ALICE, BOB]);
    }

    #[test]
    fn zero_address_is_never_a_candidate() {
        let candidates = [Address::ZERO, ALICE, BOB, ALICE]
            .into_iter()
            .collect::<CandidateSet>();

        assert!(candidates.into_vec() == vec![ALICE, BOB]);
    }

    #[test]
    fn deployment_set_must_match_exactly() {
        assert!(verify_deployments(&[ALICE, BOB], &[ALICE, BOB]).is_ok());
        assert!(let Err(BatchError::UnexpectedDeploymentSet { .. }) =
            verify_deployments(&[ALICE, BOB], &[BOB, ALICE]));
        assert!(let Err(BatchError::UnexpectedDeploymentSet { .. }) =
            verify_deployments(&[ALICE, BOB], &[ALICE, BOB, Address::ZERO]));
    }
}
