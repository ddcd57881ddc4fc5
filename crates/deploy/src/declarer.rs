//! Declaring contract classes that are not yet known on-chain.

use starknet::core::types::Felt;

use crate::{
    artifacts::ArtifactLoader,
    chain::Chain,
    context::DeploymentContext,
    error::{DeployError, Step},
    registry::{ClassHasher, ClassRegistry, ClassStatus},
};

/// What the declarer did for one contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclareOutcome {
    AlreadyDeclared { class_hash: Felt },
    Declared { class_hash: Felt, tx_hash: Felt },
}

impl DeclareOutcome {
    pub fn class_hash(&self) -> Felt {
        match self {
            Self::AlreadyDeclared { class_hash } | Self::Declared { class_hash, .. } => *class_hash,
        }
    }
}

pub struct Declarer<'a, H> {
    artifacts: &'a ArtifactLoader,
    registry: ClassRegistry<H>,
}

impl<'a, H: ClassHasher> Declarer<'a, H> {
    pub fn new(artifacts: &'a ArtifactLoader, hasher: H) -> Self {
        Self {
            artifacts,
            registry: ClassRegistry::new(hasher),
        }
    }

    /// Make sure the class of `contract` is declared.
    ///
    /// Every declare is gated on a fresh existence check, so running this twice
    /// never re-declares. The class hash is recorded in the ledger either way.
    pub async fn declare<C: Chain>(
        &self,
        ctx: &mut DeploymentContext<C>,
        contract: &str,
    ) -> Result<DeclareOutcome, DeployError> {
        let artifact = self.artifacts.load(contract)?;
        let class_hash = self.registry.class_hash(&artifact)?;

        let status = self.registry.status(&ctx.chain, contract, class_hash).await?;

        let outcome = match status {
            ClassStatus::Known => {
                tracing::info!(
                    contract,
                    class_hash = %format!("{:#x}", class_hash),
                    "Class already declared"
                );
                DeclareOutcome::AlreadyDeclared { class_hash }
            }
            ClassStatus::Unknown => {
                let step = Step::Declare(contract.to_string());
                let nonce = ctx.next_nonce().await?;

                tracing::info!(contract, nonce, "Declaring class...");

                let tx = ctx
                    .chain
                    .submit_declare(&artifact, nonce)
                    .await
                    .map_err(|e| DeployError::submission(&step, e))?;
                ctx.confirm(&step, &tx).await?;

                tracing::info!(
                    contract,
                    class_hash = %format!("{:#x}", class_hash),
                    tx_hash = %format!("{:#x}", tx.tx_hash),
                    "Class declared"
                );
                DeclareOutcome::Declared {
                    class_hash,
                    tx_hash: tx.tx_hash,
                }
            }
        };

        ctx.ledger
            .update(|ledger| ledger.record_class(contract, class_hash))?;

        Ok(outcome)
    }

    /// Declare every contract in order, halting on the first failure.
    pub async fn declare_all<'n, C, I>(
        &self,
        ctx: &mut DeploymentContext<C>,
        contracts: I,
    ) -> Result<Vec<(String, DeclareOutcome)>, DeployError>
    where
        C: Chain,
        I: IntoIterator<Item = &'n str>,
    {
        let mut outcomes = Vec::new();
        for contract in contracts {
            let outcome = self.declare(ctx, contract).await?;
            outcomes.push((contract.to_string(), outcome));
        }
        Ok(outcomes)
    }
}
