//! Nonce assignment for the single deploying account.

use crate::{
    chain::Chain,
    error::{DeployError, Step},
};

/// In-process nonce counter.
///
/// The chain is queried once, on the first request. Every later request
/// returns the previous nonce + 1: the `latest` block does not reflect
/// transactions that are still pending, so re-querying would hand out
/// duplicates. Requests take `&mut self`, which serializes all writers.
#[derive(Debug, Default)]
pub struct NonceSequencer {
    next: Option<u64>,
    issued: u64,
}

impl NonceSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known nonce instead of querying the chain.
    pub fn starting_at(nonce: u64) -> Self {
        Self {
            next: Some(nonce),
            issued: 0,
        }
    }

    /// Hand out the nonce for the next transaction.
    pub async fn next_nonce<C: Chain>(&mut self, chain: &C) -> Result<u64, DeployError> {
        let nonce = match self.next {
            Some(nonce) => nonce,
            None => {
                let nonce = chain
                    .account_nonce()
                    .await
                    .map_err(|source| DeployError::Transport {
                        step: Step::Nonce,
                        source,
                    })?;
                tracing::info!(nonce, "Fetched account nonce");
                nonce
            }
        };

        self.next = Some(nonce + 1);
        self.issued += 1;

        tracing::debug!(nonce, issued = self.issued, "Assigned nonce");

        Ok(nonce)
    }

    /// Number of nonces handed out by this process.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    /// The nonce the next request will return, if already known.
    pub fn peek(&self) -> Option<u64> {
        self.next
    }
}
