//! Chain collaborator interface and transaction confirmation.
//!
//! The pipeline never talks to an RPC endpoint directly: everything goes
//! through [`Chain`], so the whole orchestration can be exercised against an
//! in-memory chain.

use std::{future::Future, time::Duration};

use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;

use crate::{
    artifacts::ContractArtifact,
    error::{ChainError, DeployError, Step},
};

/// Handle on a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle {
    pub tx_hash: Felt,
}

/// A submitted deploy transaction with the address the contract will land at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploySubmission {
    pub tx: TxHandle,
    pub address: Felt,
}

/// Observed state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Not yet included, keep polling.
    Pending,
    /// Included and executed successfully.
    Confirmed,
    /// Reverted or dropped; terminal.
    Rejected(String),
}

/// Everything the pipeline needs from the chain and the signing account.
///
/// All write methods take the nonce explicitly: nonce assignment belongs to the
/// [`NonceSequencer`](crate::NonceSequencer), never to the adapter.
pub trait Chain: Send + Sync {
    /// Address of the deploying account.
    fn account_address(&self) -> Felt;

    /// Whether a class with this hash is declared.
    fn class_exists(&self, class_hash: Felt)
    -> impl Future<Output = Result<bool, ChainError>> + Send;

    /// The account nonce, as seen on the latest block.
    fn account_nonce(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;

    fn submit_declare(
        &self,
        artifact: &ContractArtifact,
        nonce: u64,
    ) -> impl Future<Output = Result<TxHandle, ChainError>> + Send;

    fn submit_deploy(
        &self,
        class_hash: Felt,
        constructor_args: &[Felt],
        salt: Felt,
        nonce: u64,
    ) -> impl Future<Output = Result<DeploySubmission, ChainError>> + Send;

    fn submit_call(
        &self,
        target: Felt,
        entrypoint: &str,
        args: &[Felt],
        nonce: u64,
    ) -> impl Future<Output = Result<TxHandle, ChainError>> + Send;

    fn transaction_status(
        &self,
        tx: &TxHandle,
    ) -> impl Future<Output = Result<TxStatus, ChainError>> + Send;
}

/// Default time to wait for a transaction before giving up.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 300;
/// Default interval between two receipt polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// Default number of retries of a status poll failing with a transport error.
pub const DEFAULT_TRANSPORT_RETRIES: usize = 3;

/// How long and how often to poll for confirmations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationPolicy {
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub transport_retries: usize,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            transport_retries: DEFAULT_TRANSPORT_RETRIES,
        }
    }
}

impl ConfirmationPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Block until `tx` is confirmed, rejected, or the policy timeout elapses.
///
/// Transport errors on a single poll are retried `transport_retries` times
/// before being surfaced.
pub async fn wait_for_confirmation<C: Chain>(
    chain: &C,
    step: &Step,
    tx: &TxHandle,
    policy: &ConfirmationPolicy,
) -> Result<(), DeployError> {
    let poll = || async {
        loop {
            let status = (|| chain.transaction_status(tx))
                .retry(
                    ConstantBuilder::default()
                        .with_delay(policy.poll_interval())
                        .with_max_times(policy.transport_retries),
                )
                .when(ChainError::is_transport)
                .notify(|err, delay| {
                    tracing::warn!(%step, error = %err, ?delay, "Status poll failed, retrying...");
                })
                .await;

            match status {
                Ok(TxStatus::Pending) => {
                    tracing::trace!(%step, tx_hash = %format!("{:#x}", tx.tx_hash), "Transaction pending");
                    tokio::time::sleep(policy.poll_interval()).await;
                }
                Ok(TxStatus::Confirmed) => return Ok(()),
                Ok(TxStatus::Rejected(reason)) => return Err(DeployError::rejected(step, reason)),
                Err(source) => return Err(DeployError::submission(step, source)),
            }
        }
    };

    tokio::time::timeout(policy.timeout(), poll())
        .await
        .map_err(|_| DeployError::ConfirmationTimeout {
            step: step.clone(),
            tx_hash: tx.tx_hash,
            timeout: policy.timeout(),
        })?
}
