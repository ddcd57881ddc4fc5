//! Content-addressed class hashes and their on-chain existence.

use starknet::core::types::{Felt, contract::SierraClass};

use crate::{
    artifacts::ContractArtifact,
    chain::Chain,
    error::{ArtifactError, DeployError},
};

/// Computes the class hash of an artifact.
///
/// Must match the chain's hashing algorithm bit for bit, since the result is
/// used to query whether the class is already declared.
pub trait ClassHasher: Send + Sync {
    fn class_hash(&self, artifact: &ContractArtifact) -> Result<Felt, ArtifactError>;
}

/// Canonical Sierra class hash, as computed by the sequencer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SierraClassHasher;

impl ClassHasher for SierraClassHasher {
    fn class_hash(&self, artifact: &ContractArtifact) -> Result<Felt, ArtifactError> {
        let class: SierraClass = serde_json::from_value(artifact.sierra.clone()).map_err(|e| {
            ArtifactError::ClassHash {
                contract: artifact.contract.clone(),
                reason: format!("not a Sierra class: {e}"),
            }
        })?;

        class.class_hash().map_err(|e| ArtifactError::ClassHash {
            contract: artifact.contract.clone(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassStatus {
    Known,
    Unknown,
}

/// Class hash bookkeeping for the declarer.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry<H> {
    hasher: H,
}

impl<H: ClassHasher> ClassRegistry<H> {
    pub fn new(hasher: H) -> Self {
        Self { hasher }
    }

    pub fn class_hash(&self, artifact: &ContractArtifact) -> Result<Felt, ArtifactError> {
        self.hasher.class_hash(artifact)
    }

    /// Query the chain for `class_hash`.
    ///
    /// A transport failure is an error, never an `Unknown`: treating it as
    /// unknown would submit a declare for a class that may already exist.
    pub async fn status<C: Chain>(
        &self,
        chain: &C,
        contract: &str,
        class_hash: Felt,
    ) -> Result<ClassStatus, DeployError> {
        let exists = chain
            .class_exists(class_hash)
            .await
            .map_err(|source| DeployError::Query {
                contract: contract.to_string(),
                class_hash,
                source,
            })?;

        Ok(if exists {
            ClassStatus::Known
        } else {
            ClassStatus::Unknown
        })
    }
}
