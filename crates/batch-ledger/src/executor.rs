//! Read and write actions over a candidate set, checkpointed in the ledger after every
//! account.

use std::time::Duration;

use alloy_network::TransactionBuilder;
use alloy_primitives::{Address, TxHash, U256};
use alloy_rpc_types::{BlockId, TransactionRequest};
use alloy_sol_types::SolCall;
use snx_contract::{AmountCall, ChainClient, ChainError, ChainResult, Receipt, ERC20};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::{
    revert::replay_for_reason, AccountPatch, Amount, BatchError, BatchResult, RunContext,
};

/// A read-only call yielding one amount per account, stored in the ledger under `name`.
#[derive(Clone, Debug)]
pub struct AmountRead {
    name: String,
    contract: Address,
    encode: fn(Address) -> Vec<u8>,
    decode: fn(&[u8]) -> ChainResult<U256>,
}

fn encode_for<Call: AmountCall>(account: Address) -> Vec<u8> {
    Call::for_account(account).abi_encode()
}

impl AmountRead {
    pub fn new<Call: AmountCall>(name: impl Into<String>, contract: Address) -> Self {
        Self {
            name: name.into(),
            contract,
            encode: encode_for::<Call>,
            decode: Call::decode_amount,
        }
    }

    /// ERC20 `balanceOf` on `token`.
    pub fn token_balance(name: impl Into<String>, token: Address) -> Self {
        Self::new::<ERC20::balanceOfCall>(name, token)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn request(&self, account: Address) -> TransactionRequest {
        TransactionRequest::default()
            .with_to(self.contract)
            .with_input((self.encode)(account))
    }
}

/// Perform `read` for `account` at `block`.
pub async fn read_amount<C: ChainClient>(
    chain: &C,
    read: &AmountRead,
    account: Address,
    block: BlockId,
) -> BatchResult<Amount> {
    let output = chain.call(&read.request(account), block).await?;
    Ok((read.decode)(&output)?.into())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadReport {
    pub read: usize,
    pub skipped: usize,
    /// Accounts whose read failed; they stay unrecorded and are retried by the next run.
    pub failed: Vec<Address>,
}

/// Perform every read in `reads` for each candidate, in order, saving after every account.
///
/// Accounts that already hold all requested amounts are skipped. The first RPC failure aborts
/// the run; everything recorded so far stays on disk.
pub async fn read_balances<C: ChainClient>(
    ctx: &mut RunContext<C>,
    candidates: &[Address],
    reads: &[AmountRead],
    block: BlockId,
) -> BatchResult<ReadReport> {
    let mut report = ReadReport::default();
    for (index, account) in candidates.iter().enumerate() {
        let already_read = ctx.ledger().account(account).is_some_and(|record| {
            reads
                .iter()
                .all(|read| record.amount(read.name()).is_some())
        });
        if already_read {
            report.skipped += 1;
            continue;
        }

        let mut patch = AccountPatch::new();
        for read in reads {
            let amount = read_amount(&ctx.chain, read, *account, block).await?;
            patch = patch.amount(read.name(), amount);
        }
        ctx.store.upsert_and_save(*account, patch)?;
        report.read += 1;
        info!(
            account = %account,
            progress = %format!("{}/{}", index + 1, candidates.len()),
            "Recorded balances"
        );
    }
    Ok(report)
}

/// One transfer to make. Ephemeral: only its outcome is persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAction {
    pub recipient: Address,
    pub amount: Amount,
    /// Wei.
    pub gas_price: Option<u128>,
    pub gas_limit: Option<u64>,
    pub nonce: Option<u64>,
}

impl PendingAction {
    pub fn new(recipient: Address, amount: Amount) -> Self {
        Self {
            recipient,
            amount,
            gas_price: None,
            gas_limit: None,
            nonce: None,
        }
    }

    pub fn with_gas(mut self, gas_price: Option<u128>, gas_limit: Option<u64>) -> Self {
        self.gas_price = gas_price;
        self.gas_limit = gas_limit;
        self
    }

    fn transfer_request(&self, token: Address, sender: Option<Address>) -> TransactionRequest {
        let calldata = ERC20::transferCall {
            recipient: self.recipient,
            amount: self.amount.as_u256(),
        }
        .abi_encode();
        let mut request = call_request(token, calldata, sender, self.gas_price, self.gas_limit);
        if let Some(nonce) = self.nonce {
            request = request.with_nonce(nonce);
        }
        request
    }
}

/// A contract call from `sender`, with the gas settings given on the command line. Unset gas
/// settings are left to the provider.
pub fn call_request(
    contract: Address,
    calldata: Vec<u8>,
    sender: Option<Address>,
    gas_price: Option<u128>,
    gas_limit: Option<u64>,
) -> TransactionRequest {
    let mut request = TransactionRequest::default()
        .with_to(contract)
        .with_input(calldata);
    if let Some(sender) = sender {
        request = request.with_from(sender);
    }
    if let Some(gas_price) = gas_price {
        request = request.with_gas_price(gas_price);
    }
    if let Some(gas_limit) = gas_limit {
        request = request.with_gas_limit(gas_limit);
    }
    request
}

/// Terminal state of one write action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The ledger already marks the action as done for this account.
    AlreadyComplete,
    /// Dry run: nothing was sent.
    Planned,
    Confirmed {
        tx_hash: TxHash,
        balance_after: Option<Amount>,
    },
    Reverted {
        tx_hash: TxHash,
        reason: Option<String>,
    },
    Errored {
        tx_hash: Option<TxHash>,
        reason: String,
    },
}

impl ActionOutcome {
    /// The failure carried by this outcome, if any.
    pub fn error(&self, account: Address) -> Option<BatchError> {
        match self {
            ActionOutcome::Reverted { tx_hash, reason } => Some(BatchError::Reverted {
                account,
                tx_hash: Some(*tx_hash),
                reason: reason.clone().unwrap_or_else(|| "unknown reason".into()),
            }),
            ActionOutcome::Errored { reason, .. } => {
                Some(BatchError::Rpc(ChainError::Other(reason.clone())))
            }
            _ => None,
        }
    }
}

/// Summary of one batch of write actions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub confirmed: usize,
    pub reverted: usize,
    pub errored: usize,
    pub skipped: usize,
    pub planned: usize,
    /// Sum of the confirmed amounts.
    pub transferred: Amount,
    /// Accounts still lacking the completion flag.
    pub pending: Vec<Address>,
}

impl BatchReport {
    fn record(&mut self, action: &PendingAction, outcome: &ActionOutcome) -> BatchResult<()> {
        match outcome {
            ActionOutcome::AlreadyComplete => self.skipped += 1,
            ActionOutcome::Planned => {
                self.planned += 1;
                self.pending.push(action.recipient);
            }
            ActionOutcome::Confirmed { .. } => {
                self.confirmed += 1;
                self.transferred = self.transferred.checked_add(action.amount)?;
            }
            ActionOutcome::Reverted { .. } => {
                self.reverted += 1;
                self.pending.push(action.recipient);
            }
            ActionOutcome::Errored { .. } => {
                self.errored += 1;
                self.pending.push(action.recipient);
            }
        }
        Ok(())
    }

    pub fn is_clean(&self) -> bool {
        self.reverted == 0 && self.errored == 0
    }
}

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How long to wait for a submitted transaction to be mined, and how often to ask.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for Confirmation {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Confirmation {
    /// Take a built `request` through `Submitted` to `Confirmed`, `Reverted` or `Errored`.
    ///
    /// Never touches the ledger: recording a confirmed outcome is up to the caller.
    pub async fn send_and_confirm<C: ChainClient>(
        &self,
        chain: &C,
        request: TransactionRequest,
    ) -> ActionOutcome {
        // Submitted
        let tx_hash = match chain.send_transaction(request.clone()).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                return ActionOutcome::Errored {
                    tx_hash: None,
                    reason: format!("Submission failed: {e}"),
                }
            }
        };
        info!(%tx_hash, "Transaction submitted");

        let receipt = match self.wait_for_receipt(chain, tx_hash).await {
            Ok(receipt) => receipt,
            Err(reason) => {
                return ActionOutcome::Errored {
                    tx_hash: Some(tx_hash),
                    reason,
                }
            }
        };

        // Reverted
        if !receipt.success {
            let block = receipt
                .block_number
                .map(BlockId::number)
                .unwrap_or_else(BlockId::latest);
            let reason = match replay_for_reason(chain, &request, block).await {
                Ok(reason) => reason,
                Err(e) => {
                    warn!(%tx_hash, error = %e, "Couldn't replay reverted transaction");
                    None
                }
            };
            return ActionOutcome::Reverted { tx_hash, reason };
        }

        ActionOutcome::Confirmed {
            tx_hash,
            balance_after: None,
        }
    }

    /// Poll for the receipt until it shows up or the timeout elapses. Failed polls are retried:
    /// the transaction may well be mined already.
    async fn wait_for_receipt<C: ChainClient>(
        &self,
        chain: &C,
        tx_hash: TxHash,
    ) -> Result<Receipt, String> {
        let poll = async {
            loop {
                match chain.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => warn!(%tx_hash, error = %e, "Receipt poll failed"),
                }
                sleep(self.poll_interval).await;
            }
        };
        timeout(self.timeout, poll)
            .await
            .map_err(|_| format!("No receipt within {}s", self.timeout.as_secs_f64()))
    }
}

/// Sequential ERC20 transfers recorded under the completion flag `action`.
///
/// On confirmation the account gets the amount `<action>_amount`, the flag `<action> = true`,
/// the flag `<action>_tx` and, when it can be read, the amount `<action>_balance_after`.
#[derive(Clone, Debug)]
pub struct TransferExecutor {
    action: String,
    token: Address,
    confirmation: Confirmation,
}

impl TransferExecutor {
    pub fn new(action: impl Into<String>, token: Address) -> Self {
        Self {
            action: action.into(),
            token,
            confirmation: Confirmation::default(),
        }
    }

    pub fn with_confirmation_timeout(mut self, confirmation_timeout: Duration) -> Self {
        self.confirmation.timeout = confirmation_timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.confirmation.poll_interval = poll_interval;
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Name of the amount recorded on confirmation, also the name of its ledger total.
    pub fn amount_name(&self) -> String {
        format!("{}_amount", self.action)
    }

    pub fn tx_flag(&self) -> String {
        format!("{}_tx", self.action)
    }

    pub fn balance_after_amount(&self) -> String {
        format!("{}_balance_after", self.action)
    }

    fn balance_read(&self) -> AmountRead {
        AmountRead::token_balance(self.balance_after_amount(), self.token)
    }

    /// Check that the signer can fund every action that is not complete yet. Skipped in dry run.
    /// Returns the amount still to be transferred.
    pub async fn ensure_signer_balance<C: ChainClient>(
        &self,
        ctx: &RunContext<C>,
        actions: &[PendingAction],
    ) -> BatchResult<Amount> {
        let required = Amount::sum(
            actions
                .iter()
                .filter(|action| !ctx.ledger().is_complete(&action.recipient, &self.action))
                .map(|action| &action.amount),
        )?;
        if ctx.dry_run {
            info!(required = %required, "Dry run, not checking the signer balance");
            return Ok(required);
        }

        let signer = ctx.chain.signer_address().ok_or_else(|| {
            BatchError::InvalidInput("A signer is required for write actions".into())
        })?;
        let available =
            read_amount(&ctx.chain, &self.balance_read(), signer, BlockId::latest()).await?;
        if available < required {
            return Err(BatchError::InsufficientSignerBalance {
                required,
                available,
            });
        }
        info!(
            signer = %signer,
            required = %required.to_ether_string(),
            available = %available.to_ether_string(),
            "Signer balance is sufficient"
        );
        Ok(required)
    }

    /// Run one action to a terminal state. `Err` only for failures that must stop the batch,
    /// such as the ledger no longer being writable.
    pub async fn execute<C: ChainClient>(
        &self,
        ctx: &mut RunContext<C>,
        action: &PendingAction,
    ) -> BatchResult<ActionOutcome> {
        let recipient = action.recipient;
        if ctx.ledger().is_complete(&recipient, &self.action) {
            debug!(account = %recipient, "Already complete, skipping");
            return Ok(ActionOutcome::AlreadyComplete);
        }
        if ctx.dry_run {
            info!(
                account = %recipient,
                amount = %action.amount.to_ether_string(),
                "Dry run, would transfer"
            );
            return Ok(ActionOutcome::Planned);
        }

        // Built
        let request = action.transfer_request(self.token, ctx.chain.signer_address());
        let tx_hash = match self.confirmation.send_and_confirm(&ctx.chain, request).await {
            ActionOutcome::Confirmed { tx_hash, .. } => tx_hash,
            outcome => return Ok(outcome),
        };

        // Confirmed
        let balance_after =
            match read_amount(&ctx.chain, &self.balance_read(), recipient, BlockId::latest()).await
            {
                Ok(balance) => Some(balance),
                Err(e) => {
                    warn!(account = %recipient, error = %e, "Couldn't read balance after transfer");
                    None
                }
            };
        let mut patch = AccountPatch::new()
            .amount(self.amount_name(), action.amount)
            .flag(self.action.clone(), true)
            .flag(self.tx_flag(), tx_hash);
        if let Some(balance) = balance_after {
            patch = patch.amount(self.balance_after_amount(), balance);
        }
        ctx.store.upsert_and_save(recipient, patch)?;

        Ok(ActionOutcome::Confirmed {
            tx_hash,
            balance_after,
        })
    }

    /// Check the signer balance, then execute `actions` strictly one after another.
    ///
    /// Per-account failures are logged and the batch moves on.
    pub async fn execute_batch<C: ChainClient>(
        &self,
        ctx: &mut RunContext<C>,
        actions: &[PendingAction],
    ) -> BatchResult<BatchReport> {
        self.ensure_signer_balance(ctx, actions).await?;

        let mut report = BatchReport::default();
        for (index, action) in actions.iter().enumerate() {
            let outcome = self.execute(ctx, action).await?;
            let progress = format!("{}/{}", index + 1, actions.len());
            match &outcome {
                ActionOutcome::Confirmed { tx_hash, .. } => info!(
                    account = %action.recipient,
                    amount = %action.amount.to_ether_string(),
                    %tx_hash,
                    progress = %progress,
                    "Transfer confirmed"
                ),
                ActionOutcome::Reverted { .. } | ActionOutcome::Errored { .. } => {
                    if let Some(err) = outcome.error(action.recipient) {
                        error!(
                            account = %action.recipient,
                            amount = %action.amount.to_ether_string(),
                            error = %err,
                            progress = %progress,
                            "Transfer failed"
                        );
                    }
                }
                ActionOutcome::AlreadyComplete | ActionOutcome::Planned => {}
            }
            report.record(action, &outcome)?;
        }

        info!(
            confirmed = report.confirmed,
            reverted = report.reverted,
            errored = report.errored,
            skipped = report.skipped,
            planned = report.planned,
            transferred = %report.transferred.to_ether_string(),
            "Batch finished"
        );
        Ok(report)
    }
}
