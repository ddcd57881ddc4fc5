//! fusd-deploy - Deployment library for the FUSD protocol on Starknet.
//!
//! This crate declares the FUSD contract classes, deploys every contract in
//! dependency order and wires the access-control roles between them. Progress
//! is recorded in a ledger so an interrupted deployment can be resumed.

pub use starknet::core::types::Felt;

mod error;
pub use error::{ArtifactError, ChainError, DeployError, LedgerError, Step};

mod artifacts;
pub use artifacts::{ArtifactLoader, ContractArtifact, DEFAULT_ARTIFACTS_DIR, DEFAULT_PACKAGE};

mod chain;
pub use chain::{
    Chain, ConfirmationPolicy, DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_TRANSPORT_RETRIES, DeploySubmission, TxHandle, TxStatus, wait_for_confirmation,
};

mod nonce;
pub use nonce::NonceSequencer;

mod registry;
pub use registry::{ClassHasher, ClassRegistry, ClassStatus, SierraClassHasher};

pub mod plan;
pub use plan::{ConstructorArg, ContractSpec, DeploymentPlan, PlanConfig};

mod roles;
pub use roles::{GRANT_ROLE_ENTRYPOINT, Role, RoleGrant, fusd_grants};

mod ledger;
pub use ledger::{
    DEFAULT_LEDGER_FILENAME, DeployedContract, DeploymentLedger, GrantRecord, LEDGER_VERSION,
    LedgerStore,
};

mod context;
pub use context::DeploymentContext;

mod declarer;
pub use declarer::{DeclareOutcome, Declarer};

mod deployer;
pub use deployer::{DeployOutcome, deploy_all, deploy_contract};

mod configurator;
pub use configurator::{GrantOutcome, ResolvedGrant, grant_all, resolve_grants};

mod pipeline;
pub use pipeline::{DeploymentReport, run_full, run_grants};

mod starknet_chain;
pub use starknet_chain::{DEFAULT_RPC_URL, StarknetAccount, StarknetChain};

mod config;
pub use config::{CONFIG_FILENAME, DeployConfig};
