use snx_contract::ChainClient;

use crate::{Ledger, LedgerStore};

/// Everything one job run works with, built once at start-up and handed to every stage.
pub struct RunContext<C> {
    pub chain: C,
    pub store: LedgerStore,
    /// Plan and log write actions without sending anything or touching the ledger.
    pub dry_run: bool,
}

impl<C: ChainClient> RunContext<C> {
    pub fn new(chain: C, store: LedgerStore) -> Self {
        Self {
            chain,
            store,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn ledger(&self) -> &Ledger {
        self.store.ledger()
    }
}
