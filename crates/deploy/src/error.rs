//! Error taxonomy for the deployment pipeline.
//!
//! Chain adapters surface [`ChainError`]. The pipeline components wrap it into
//! [`DeployError`], attaching the step that was running so a halted run can be
//! diagnosed and resumed.

use std::{fmt, path::PathBuf, time::Duration};

use starknet::core::types::Felt;

/// Failure reported by a chain collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The RPC endpoint could not be reached or returned garbage.
    #[error("transport error: {0}")]
    Transport(String),
    /// The node refused the request (validation failure, insufficient fee, ...).
    #[error("rejected by node: {0}")]
    Rejected(String),
}

impl ChainError {
    pub fn transport(err: impl fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Missing or corrupt build output.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact for {contract} not found at {}", path.display())]
    NotFound { contract: String, path: PathBuf },
    #[error("artifact for {contract} at {} could not be parsed: {reason}", path.display())]
    Parse {
        contract: String,
        path: PathBuf,
        reason: String,
    },
    #[error("failed to compute class hash for {contract}: {reason}")]
    ClassHash { contract: String, reason: String },
}

/// Failure while reading or writing the deployment ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to access ledger at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ledger at {} is not valid JSON: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("ledger at {} is locked by another process", path.display())]
    Locked { path: PathBuf },
    #[error("ledger was recorded for account {recorded:#x}, current account is {current:#x}")]
    AccountMismatch { recorded: Felt, current: Felt },
}

/// A single on-chain step of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Nonce,
    Declare(String),
    Deploy(String),
    Grant(String),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Nonce => write!(f, "fetch account nonce"),
            Step::Declare(contract) => write!(f, "declare {contract}"),
            Step::Deploy(contract) => write!(f, "deploy {contract}"),
            Step::Grant(grant) => write!(f, "grant {grant}"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("failed to query class {class_hash:#x} of {contract}: {source}")]
    Query {
        contract: String,
        class_hash: Felt,
        #[source]
        source: ChainError,
    },

    #[error("{step} failed: {source}")]
    Transport {
        step: Step,
        #[source]
        source: ChainError,
    },

    #[error("declare of {contract} failed: {reason}")]
    DeclareFailed { contract: String, reason: String },

    #[error("deploy of {contract} failed: {reason}")]
    DeployFailed { contract: String, reason: String },

    #[error("grant {grant} failed: {reason}")]
    GrantFailed { grant: String, reason: String },

    #[error("{step}: transaction {tx_hash:#x} not confirmed after {}s", timeout.as_secs())]
    ConfirmationTimeout {
        step: Step,
        tx_hash: Felt,
        timeout: Duration,
    },

    #[error("{contract} requires {dependency}, which has no confirmed deployment")]
    UnresolvedDependency { contract: String, dependency: String },

    #[error("grant {grant} references {contract}, which is missing from the ledger")]
    MissingAddress { grant: String, contract: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("invalid deployment plan: {0}")]
    Plan(String),
}

impl DeployError {
    /// Builds the "chain said no" failure matching the kind of step.
    pub(crate) fn rejected(step: &Step, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        match step {
            Step::Declare(contract) => Self::DeclareFailed {
                contract: contract.clone(),
                reason,
            },
            Step::Deploy(contract) => Self::DeployFailed {
                contract: contract.clone(),
                reason,
            },
            Step::Grant(grant) => Self::GrantFailed {
                grant: grant.clone(),
                reason,
            },
            Step::Nonce => Self::Transport {
                step: Step::Nonce,
                source: ChainError::Rejected(reason),
            },
        }
    }

    /// Maps a failed submission of `step` to the matching error kind.
    pub(crate) fn submission(step: &Step, err: ChainError) -> Self {
        match err {
            ChainError::Rejected(reason) => Self::rejected(step, reason),
            transport => Self::Transport {
                step: step.clone(),
                source: transport,
            },
        }
    }

    /// The step that halted the pipeline, when the error is tied to one.
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Artifact(ArtifactError::NotFound { contract, .. })
            | Self::Artifact(ArtifactError::Parse { contract, .. })
            | Self::Artifact(ArtifactError::ClassHash { contract, .. })
            | Self::Query { contract, .. }
            | Self::DeclareFailed { contract, .. } => Some(Step::Declare(contract.clone())),
            Self::DeployFailed { contract, .. } | Self::UnresolvedDependency { contract, .. } => {
                Some(Step::Deploy(contract.clone()))
            }
            Self::GrantFailed { grant, .. } | Self::MissingAddress { grant, .. } => {
                Some(Step::Grant(grant.clone()))
            }
            Self::Transport { step, .. } | Self::ConfirmationTimeout { step, .. } => {
                Some(step.clone())
            }
            Self::Ledger(_) | Self::Plan(_) => None,
        }
    }

    /// Whether re-running the pipeline unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Query { .. } | Self::Transport { .. } | Self::ConfirmationTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_maps_to_step_kind() {
        let err = DeployError::submission(
            &Step::Deploy("Staking".to_string()),
            ChainError::Rejected("out of gas".to_string()),
        );
        assert!(matches!(err, DeployError::DeployFailed { ref contract, .. } if contract == "Staking"));
        assert!(!err.is_retryable());

        let err = DeployError::submission(
            &Step::Grant("MINTER on FUSDToken".to_string()),
            ChainError::Transport("connection reset".to_string()),
        );
        assert!(matches!(err, DeployError::Transport { .. }));
        assert!(err.is_retryable());
        assert_eq!(err.step(), Some(Step::Grant("MINTER on FUSDToken".to_string())));
    }

    #[test]
    fn test_error_message_names_step() {
        let err = DeployError::ConfirmationTimeout {
            step: Step::Declare("Treasury".to_string()),
            tx_hash: Felt::from(0xabcu64),
            timeout: Duration::from_secs(30),
        };
        let message = err.to_string();
        assert!(message.starts_with("declare Treasury: transaction "));
        assert!(message.ends_with("not confirmed after 30s"));
        assert_eq!(err.step(), Some(Step::Declare("Treasury".to_string())));
    }
}
