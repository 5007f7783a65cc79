#![allow(unused)]

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use alloy_primitives::{address, keccak256, Address, Bytes, TxHash, U256};
use alloy_rpc_types::{BlockId, BlockNumberOrTag, Filter, Log, TransactionRequest};
use alloy_sol_types::{Revert, SolCall, SolError, SolEvent, SolValue};
use batch_ledger::{LedgerStore, RunContext};
use snx_contract::{
    BlockInfo, ChainClient, ChainError, ChainResult, MinedTransaction, Receipt, ERC20,
};

pub const SIGNER: Address = address!("5555555555555555555555555555555555555555");
pub const TOKEN: Address = address!("7777777777777777777777777777777777777777");
pub const ALICE: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
pub const BOB: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
pub const CAROL: Address = address!("cccccccccccccccccccccccccccccccccccccccc");

/// How the mock node treats a transfer to a given recipient.
#[derive(Clone, Debug, Default)]
pub enum TransferBehaviour {
    #[default]
    Succeed,
    /// Mined with a failed receipt; replaying it reverts with this message.
    Revert(String),
    /// Refused at submission.
    Reject(String),
    /// Accepted, never mined.
    NeverMined,
}

#[derive(Default)]
struct MockState {
    head: u64,
    signer: Option<Address>,
    logs: Vec<Log>,
    /// (contract, account) -> amount returned by any single-account read.
    balances: HashMap<(Address, Address), U256>,
    behaviours: HashMap<Address, TransferBehaviour>,
    failing_reads: HashSet<Address>,
    sent: Vec<TransactionRequest>,
    receipts: HashMap<TxHash, Receipt>,
    transactions: HashMap<TxHash, MinedTransaction>,
    get_logs_calls: usize,
}

/// In-memory node: event logs, one amount per (contract, account), and ERC20 transfers.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(head: u64) -> Arc<Self> {
        let chain = Self::default();
        chain.lock().head = head;
        Arc::new(chain)
    }

    pub fn with_signer(head: u64, signer: Address) -> Arc<Self> {
        let chain = Self::new(head);
        chain.lock().signer = Some(signer);
        chain
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn set_balance(&self, contract: Address, account: Address, amount: impl Into<U256>) {
        self.lock()
            .balances
            .insert((contract, account), amount.into());
    }

    pub fn balance(&self, contract: Address, account: Address) -> U256 {
        self.lock().balance(contract, account)
    }

    pub fn set_behaviour(&self, recipient: Address, behaviour: TransferBehaviour) {
        self.lock().behaviours.insert(recipient, behaviour);
    }

    pub fn fail_reads_for(&self, account: Address) {
        self.lock().failing_reads.insert(account);
    }

    pub fn heal_reads(&self) {
        self.lock().failing_reads.clear();
    }

    pub fn push_event<Event: SolEvent>(
        &self,
        address: Address,
        event: &Event,
        block_number: u64,
        tx_hash: TxHash,
    ) {
        let mut state = self.lock();
        let log_index = state.logs.len() as u64;
        state.logs.push(Log {
            inner: alloy_primitives::Log {
                address,
                data: event.encode_log_data(),
            },
            block_number: Some(block_number),
            transaction_hash: Some(tx_hash),
            log_index: Some(log_index),
            ..Default::default()
        });
    }

    pub fn sent_transactions(&self) -> usize {
        self.lock().sent.len()
    }

    pub fn get_logs_calls(&self) -> usize {
        self.lock().get_logs_calls
    }
}

impl MockState {
    fn balance(&self, contract: Address, account: Address) -> U256 {
        self.balances
            .get(&(contract, account))
            .copied()
            .unwrap_or_default()
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

fn revert_data(reason: &str) -> Bytes {
    Revert::from(reason).abi_encode().into()
}

impl ChainClient for MockChain {
    async fn get_logs(&self, filter: &Filter) -> ChainResult<Vec<Log>> {
        let mut state = self.lock();
        state.get_logs_calls += 1;
        let from_block = filter.get_from_block().unwrap_or_default();
        let to_block = filter.get_to_block().unwrap_or(u64::MAX);

        Ok(state
            .logs
            .iter()
            .filter(|log| {
                let block = log.block_number.unwrap_or_default();
                filter.address.matches(&log.inner.address)
                    && log
                        .topics()
                        .first()
                        .is_some_and(|topic0| filter.topics[0].matches(topic0))
                    && (from_block..=to_block).contains(&block)
            })
            .cloned()
            .collect())
    }

    async fn call(&self, request: &TransactionRequest, _block: BlockId) -> ChainResult<Bytes> {
        let state = self.lock();
        let contract = destination(request)?;
        let input = input(request);

        if let Ok(transfer) = ERC20::transferCall::abi_decode(input, true) {
            return match state.behaviours.get(&transfer.recipient) {
                Some(TransferBehaviour::Revert(reason)) => Err(ChainError::Reverted {
                    data: revert_data(reason),
                }),
                _ => Ok(true.abi_encode().into()),
            };
        }

        // Every other supported call is a single-address amount read.
        if input.len() != 4 + 32 {
            return Err(ChainError::Other("Unsupported call".into()));
        }
        let account = Address::from_slice(&input[16..36]);
        if state.failing_reads.contains(&account) {
            return Err(ChainError::Other(format!("Read for {account} failed")));
        }
        Ok(state.balance(contract, account).abi_encode().into())
    }

    async fn send_transaction(&self, request: TransactionRequest) -> ChainResult<TxHash> {
        let mut state = self.lock();
        let signer = state
            .signer
            .ok_or_else(|| ChainError::from("Client has no signer configured"))?;
        let token = destination(&request)?;
        let calldata = input(&request).to_vec();
        let transfer = ERC20::transferCall::abi_decode(&calldata, true)?;
        let tx_hash = keccak256([token.as_slice(), calldata.as_slice()].concat());

        let behaviour = state
            .behaviours
            .get(&transfer.recipient)
            .cloned()
            .unwrap_or_default();
        let success = match behaviour {
            TransferBehaviour::Reject(message) => return Err(ChainError::Other(message)),
            TransferBehaviour::Revert(_) => Some(false),
            TransferBehaviour::NeverMined => None,
            TransferBehaviour::Succeed => {
                let funds = state.balance(token, signer);
                if funds < transfer.amount {
                    Some(false)
                } else {
                    let received = state.balance(token, transfer.recipient);
                    state
                        .balances
                        .insert((token, signer), funds - transfer.amount);
                    state
                        .balances
                        .insert((token, transfer.recipient), received + transfer.amount);
                    Some(true)
                }
            }
        };

        let block_number = state.head + 1;
        state.head = block_number;
        state.sent.push(request.clone());
        if let Some(success) = success {
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
        }
        Ok(tx_hash)
    }

    async fn get_transaction_receipt(&self, hash: TxHash) -> ChainResult<Option<Receipt>> {
        Ok(self.lock().receipts.get(&hash).copied())
    }

    async fn get_transaction(&self, hash: TxHash) -> ChainResult<Option<MinedTransaction>> {
        Ok(self.lock().transactions.get(&hash).cloned())
    }

    async fn get_block(&self, block: BlockNumberOrTag) -> ChainResult<BlockInfo> {
        let head = self.lock().head;
        let number = match block {
            BlockNumberOrTag::Number(number) if number <= head => number,
            BlockNumberOrTag::Number(number) => {
                return Err(ChainError::Other(format!("Block {number} not found")))
            }
            _ => head,
        };
        Ok(BlockInfo {
            number,
            timestamp: number * 12,
        })
    }

    fn signer_address(&self) -> Option<Address> {
        self.lock().signer
    }
}

/// Run context over `chain` with the ledger at `path`.
pub fn context(chain: &Arc<MockChain>, path: &Path) -> RunContext<Arc<MockChain>> {
    RunContext::new(chain.clone(), LedgerStore::open(path).unwrap())
}

pub fn tx(seed: u8) -> TxHash {
    TxHash::repeat_byte(seed)
}
