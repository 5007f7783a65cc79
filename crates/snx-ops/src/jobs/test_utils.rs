use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use alloy_primitives::{keccak256, Address, Bytes, TxHash, U256};
use alloy_rpc_types::{BlockId, BlockNumberOrTag, Filter, Log, TransactionRequest};
use alloy_sol_types::{Revert, SolCall, SolError, SolEvent, SolValue};
use snx_contract::{
    AmountCall, BlockInfo, ChainClient, ChainError, ChainResult, MinedTransaction, Receipt,
    RewardEscrowSchedule, ERC20,
};

type Selector = [u8; 4];

#[derive(Default)]
struct MockState {
    head: u64,
    signer: Option<Address>,
    logs: Vec<Log>,
    /// (contract, selector, account) -> raw output of a single-account read.
    outputs: HashMap<(Address, Selector, Address), Bytes>,
    /// Selectors whose transactions are mined with a failed receipt.
    reverting: HashSet<Selector>,
    sent: Vec<TransactionRequest>,
    receipts: HashMap<TxHash, Receipt>,
    transactions: HashMap<TxHash, MinedTransaction>,
}

/// In-memory node for the job tests: event logs, single-account reads, ERC20 transfers and
/// arbitrary contract calls that just get mined.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(head: u64) -> Self {
        let chain = Self::default();
        chain.lock().head = head;
        chain
    }

    pub fn with_signer(head: u64, signer: Address) -> Self {
        let chain = Self::new(head);
        chain.lock().signer = Some(signer);
        chain
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn push_event<Event: SolEvent>(&self, address: Address, event: &Event, block_number: u64) {
        let mut state = self.lock();
        let log_index = state.logs.len() as u64;
        state.logs.push(Log {
            inner: alloy_primitives::Log {
                address,
                data: event.encode_log_data(),
            },
            block_number: Some(block_number),
            transaction_hash: Some(TxHash::with_last_byte(log_index as u8 + 1)),
            log_index: Some(log_index),
            ..Default::default()
        });
    }

    /// Make `Call` on `contract` return `amount` for `account`. Unset reads return zero.
    pub fn set_amount<Call: AmountCall>(
        &self,
        contract: Address,
        account: Address,
        amount: impl Into<U256>,
    ) {
        self.set_output::<Call>(contract, account, amount.into().abi_encode());
    }

    pub fn set_output<Call: SolCall>(&self, contract: Address, account: Address, output: Vec<u8>) {
        self.lock()
            .outputs
            .insert((contract, Call::SELECTOR, account), output.into());
    }

    pub fn token_balance(&self, token: Address, account: Address) -> U256 {
        self.lock().amount(token, ERC20::balanceOfCall::SELECTOR, account)
    }

    pub fn revert_calls_to<Call: SolCall>(&self) {
        self.lock().reverting.insert(Call::SELECTOR);
    }

    /// Every sent call of type `Call`, with its destination, in sending order.
    pub fn sent<Call: SolCall>(&self) -> Vec<(Address, Call)> {
        self.lock()
            .sent
            .iter()
            .filter_map(|request| {
                let call = Call::abi_decode(input(request), true).ok()?;
                Some((destination(request).ok()?, call))
            })
            .collect()
    }
}

impl MockState {
    fn output(&self, contract: Address, selector: Selector, account: Address) -> Bytes {
        if let Some(output) = self.outputs.get(&(contract, selector, account)) {
            return output.clone();
        }
        if selector == RewardEscrowSchedule::checkAccountScheduleCall::SELECTOR {
            return [U256::ZERO; 520].abi_encode().into();
        }
        U256::ZERO.abi_encode().into()
    }

    fn amount(&self, contract: Address, selector: Selector, account: Address) -> U256 {
        U256::abi_decode(&self.output(contract, selector, account), true).unwrap_or_default()
    }

    fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> bool {
        let selector = ERC20::balanceOfCall::SELECTOR;
        let funds = self.amount(token, selector, from);
        if funds < amount {
            return false;
        }
        let received = self.amount(token, selector, to);
        self.outputs
            .insert((token, selector, from), (funds - amount).abi_encode().into());
        self.outputs
            .insert((token, selector, to), (received + amount).abi_encode().into());
        true
    }
}

fn destination(request: &TransactionRequest) -> ChainResult<Address> {
    request
        .to
        .and_then(|kind| kind.to().copied())
        .ok_or_else(|| ChainError::Other("Request has no destination".into()))
}

fn input(request: &TransactionRequest) -> &[u8] {
    request
        .input
        .input()
        .map(|input| input.as_ref())
        .unwrap_or_default()
}

fn selector(input: &[u8]) -> ChainResult<Selector> {
    input
        .get(..4)
        .and_then(|selector| selector.try_into().ok())
        .ok_or_else(|| ChainError::Other("Call has no selector".into()))
}

impl ChainClient for MockChain {
    async fn get_logs(&self, filter: &Filter) -> ChainResult<Vec<Log>> {
        let from_block = filter.get_from_block().unwrap_or_default();
        let to_block = filter.get_to_block().unwrap_or(u64::MAX);
        Ok(self
            .lock()
            .logs
            .iter()
            .filter(|log| {
                filter.address.matches(&log.inner.address)
                    && log
                        .topics()
                        .first()
                        .is_some_and(|topic0| filter.topics[0].matches(topic0))
                    && (from_block..=to_block).contains(&log.block_number.unwrap_or_default())
            })
            .cloned()
            .collect())
    }

    async fn call(&self, request: &TransactionRequest, _block: BlockId) -> ChainResult<Bytes> {
        let state = self.lock();
        let input = input(request);
        let selector = selector(input)?;
        if state.reverting.contains(&selector) {
            return Err(ChainError::Reverted {
                data: Revert::from("Only the owner can migrate").abi_encode().into(),
            });
        }
        if selector == ERC20::transferCall::SELECTOR {
            return Ok(true.abi_encode().into());
        }
        if input.len() != 4 + 32 {
            return Err(ChainError::Other("Unsupported call".into()));
        }
        let account = Address::from_slice(&input[16..36]);
        Ok(state.output(destination(request)?, selector, account))
    }

    async fn send_transaction(&self, request: TransactionRequest) -> ChainResult<TxHash> {
        let mut state = self.lock();
        let signer = state
            .signer
            .ok_or_else(|| ChainError::from("Client has no signer configured"))?;
        let contract = destination(&request)?;
        let calldata = input(&request).to_vec();
        let selector = selector(&calldata)?;

        let success = if state.reverting.contains(&selector) {
            false
        } else if let Ok(transfer) = ERC20::transferCall::abi_decode(&calldata, true) {
            state.transfer(contract, signer, transfer.recipient, transfer.amount)
        } else {
            true
        };

        let nonce = state.sent.len() as u64;
        let tx_hash = keccak256(
            [&nonce.to_be_bytes()[..], contract.as_slice(), calldata.as_slice()].concat(),
        );
        let block_number = state.head + 1;
        state.head = block_number;
        state.sent.push(request.clone());
        state.receipts.insert(
            tx_hash,
            Receipt {
                tx_hash,
                block_number: Some(block_number),
                success,
            },
        );
        state.transactions.insert(
            tx_hash,
            MinedTransaction {
                request,
                block_number: Some(block_number),
            },
        );
        Ok(tx_hash)
    }

    async fn get_transaction_receipt(&self, hash: TxHash) -> ChainResult<Option<Receipt>> {
        Ok(self.lock().receipts.get(&hash).copied())
    }

    async fn get_transaction(&self, hash: TxHash) -> ChainResult<Option<MinedTransaction>> {
        Ok(self.lock().transactions.get(&hash).cloned())
    }

    async fn get_block(&self, _block: BlockNumberOrTag) -> ChainResult<BlockInfo> {
        let number = self.lock().head;
        Ok(BlockInfo {
            number,
            timestamp: number * 12,
        })
    }

    fn signer_address(&self) -> Option<Address> {
        self.lock().signer
    }
}
