//! Deployment context passed to every pipeline stage.

use starknet::core::types::Felt;

use crate::{
    chain::{Chain, ConfirmationPolicy, TxHandle, wait_for_confirmation},
    error::{DeployError, Step},
    ledger::LedgerStore,
    nonce::NonceSequencer,
};

/// Chain client, nonce counter and ledger of one deploying account.
pub struct DeploymentContext<C> {
    pub chain: C,
    pub nonces: NonceSequencer,
    pub ledger: LedgerStore,
    pub confirmation: ConfirmationPolicy,
}

impl<C: Chain> DeploymentContext<C> {
    /// Build a context, binding the ledger to the chain's account.
    pub fn new(
        chain: C,
        mut ledger: LedgerStore,
        confirmation: ConfirmationPolicy,
    ) -> Result<Self, DeployError> {
        ledger.bind_account(chain.account_address())?;

        Ok(Self {
            chain,
            nonces: NonceSequencer::new(),
            ledger,
            confirmation,
        })
    }

    pub fn account(&self) -> Felt {
        self.chain.account_address()
    }

    pub async fn next_nonce(&mut self) -> Result<u64, DeployError> {
        self.nonces.next_nonce(&self.chain).await
    }

    pub async fn confirm(&self, step: &Step, tx: &TxHandle) -> Result<(), DeployError> {
        tracing::info!(%step, tx_hash = %format!("{:#x}", tx.tx_hash), "Waiting for confirmation...");
        wait_for_confirmation(&self.chain, step, tx, &self.confirmation).await
    }
}
