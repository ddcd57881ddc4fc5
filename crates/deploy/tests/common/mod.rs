//! In-memory chain shared by the pipeline tests.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use fusd_deploy::{
    ArtifactError, ArtifactLoader, Chain, ChainError, ClassHasher, ConfirmationPolicy,
    ContractArtifact, DeploySubmission, DeploymentContext, DeploymentLedger, Felt, LedgerStore,
    TxHandle, TxStatus,
};

pub const ACCOUNT: u64 = 0xacc0;
pub const PACKAGE: &str = "fusd";

/// Class hash the mock hasher assigns to a contract.
pub fn class_hash_of(contract: &str) -> Felt {
    Felt::from_bytes_be_slice(contract.as_bytes())
}

/// Hashes artifacts by contract name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameHasher;

impl ClassHasher for NameHasher {
    fn class_hash(&self, artifact: &ContractArtifact) -> Result<Felt, ArtifactError> {
        Ok(class_hash_of(&artifact.contract))
    }
}

/// Write placeholder Sierra and CASM documents for every contract.
pub fn write_artifacts(dir: &Path, contracts: &[&str]) -> ArtifactLoader {
    let loader = ArtifactLoader::new(dir, PACKAGE);
    for contract in contracts {
        let doc = serde_json::json!({ "contract": contract });
        std::fs::write(loader.sierra_path(contract), doc.to_string()).unwrap();
        std::fs::write(loader.casm_path(contract), doc.to_string()).unwrap();
    }
    loader
}

/// Polls fast, gives up fast.
pub fn fast_policy() -> ConfirmationPolicy {
    ConfirmationPolicy {
        timeout_secs: 5,
        poll_interval_ms: 1,
        transport_retries: 2,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Declare {
        contract: String,
        nonce: u64,
    },
    Deploy {
        class_hash: Felt,
        args: Vec<Felt>,
        salt: Felt,
        nonce: u64,
        address: Felt,
    },
    Call {
        target: Felt,
        entrypoint: String,
        args: Vec<Felt>,
        nonce: u64,
    },
}

impl Submission {
    pub fn nonce(&self) -> u64 {
        match self {
            Self::Declare { nonce, .. } | Self::Deploy { nonce, .. } | Self::Call { nonce, .. } => {
                *nonce
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Account nonce as the chain sees it.
    pub nonce: u64,
    pub known_classes: HashSet<Felt>,
    pub deployed: HashSet<Felt>,
    pub submissions: Vec<Submission>,
    pub nonce_queries: usize,
    /// Status polls per transaction.
    pub polls: HashMap<Felt, u32>,
    /// Reject deploy submissions of this class.
    pub reject_deploy_of: Option<Felt>,
    /// Accept, then revert, transactions declaring or deploying this class
    /// or calling this contract.
    pub revert_on_chain: Option<Felt>,
    /// Transactions that reverted on chain.
    pub reverted: HashSet<Felt>,
    /// Answer status polls with a node rejection.
    pub reject_status_polls: bool,
    /// Keep every transaction pending forever.
    pub never_confirm: bool,
    /// Fail this many status polls with a transport error first.
    pub flaky_polls: u32,
    pub unreachable: bool,
    next_tx: u64,
}

/// Confirms every transaction on its second status poll, unless it reverted.
///
/// Clones share their state, so a test can keep a handle on a chain owned by a
/// [`DeploymentContext`].
#[derive(Debug, Clone)]
pub struct MockChain {
    account: Felt,
    state: Arc<Mutex<MockState>>,
}

impl MockChain {
    pub fn new(nonce: u64) -> Self {
        Self {
            account: Felt::from(ACCOUNT),
            state: Arc::new(Mutex::new(MockState {
                nonce,
                ..Default::default()
            })),
        }
    }

    pub fn with_known_classes(self, contracts: &[&str]) -> Self {
        self.state()
            .known_classes
            .extend(contracts.iter().map(|c| class_hash_of(c)));
        self
    }

    pub fn with_deployed(self, addresses: &[Felt]) -> Self {
        self.state().deployed.extend(addresses.iter().copied());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    pub fn context(&self, ledger: DeploymentLedger) -> DeploymentContext<MockChain> {
        DeploymentContext::new(self.clone(), LedgerStore::in_memory(ledger), fast_policy())
            .unwrap()
    }
}

impl MockState {
    fn check_reachable(&self) -> Result<(), ChainError> {
        if self.unreachable {
            return Err(ChainError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn accept(&mut self, nonce: u64) -> Result<TxHandle, ChainError> {
        self.check_reachable()?;
        if nonce != self.nonce {
            return Err(ChainError::Rejected(format!(
                "invalid nonce: expected {}, got {nonce}",
                self.nonce
            )));
        }
        self.nonce += 1;
        self.next_tx += 1;
        Ok(TxHandle {
            tx_hash: Felt::from(0x7700 + self.next_tx),
        })
    }

    /// Whether a transaction touching `subject` reverts, marking it if so.
    fn reverts(&mut self, subject: Felt, tx: &TxHandle) -> bool {
        let reverts = self.revert_on_chain == Some(subject);
        if reverts {
            self.reverted.insert(tx.tx_hash);
        }
        reverts
    }
}

impl Chain for MockChain {
    fn account_address(&self) -> Felt {
        self.account
    }

    async fn class_exists(&self, class_hash: Felt) -> Result<bool, ChainError> {
        let state = self.state();
        state.check_reachable()?;
        Ok(state.known_classes.contains(&class_hash))
    }

    async fn account_nonce(&self) -> Result<u64, ChainError> {
        let mut state = self.state();
        state.check_reachable()?;
        state.nonce_queries += 1;
        Ok(state.nonce)
    }

    async fn submit_declare(
        &self,
        artifact: &ContractArtifact,
        nonce: u64,
    ) -> Result<TxHandle, ChainError> {
        let mut state = self.state();
        let class_hash = class_hash_of(&artifact.contract);
        if state.known_classes.contains(&class_hash) {
            return Err(ChainError::Rejected(format!(
                "class {} is already declared",
                artifact.contract
            )));
        }
        let tx = state.accept(nonce)?;
        if !state.reverts(class_hash, &tx) {
            state.known_classes.insert(class_hash);
        }
        state.submissions.push(Submission::Declare {
            contract: artifact.contract.clone(),
            nonce,
        });
        Ok(tx)
    }

    async fn submit_deploy(
        &self,
        class_hash: Felt,
        constructor_args: &[Felt],
        salt: Felt,
        nonce: u64,
    ) -> Result<DeploySubmission, ChainError> {
        let mut state = self.state();
        if !state.known_classes.contains(&class_hash) {
            return Err(ChainError::Rejected("class is not declared".to_string()));
        }
        if state.reject_deploy_of == Some(class_hash) {
            return Err(ChainError::Rejected("constructor reverted".to_string()));
        }
        let tx = state.accept(nonce)?;
        let address = Felt::from(0xc000 + state.deployed.len() as u64);
        if !state.reverts(class_hash, &tx) {
            state.deployed.insert(address);
        }
        state.submissions.push(Submission::Deploy {
            class_hash,
            args: constructor_args.to_vec(),
            salt,
            nonce,
            address,
        });
        Ok(DeploySubmission { tx, address })
    }

    async fn submit_call(
        &self,
        target: Felt,
        entrypoint: &str,
        args: &[Felt],
        nonce: u64,
    ) -> Result<TxHandle, ChainError> {
        let mut state = self.state();
        if !state.deployed.contains(&target) {
            return Err(ChainError::Rejected("contract not found".to_string()));
        }
        let tx = state.accept(nonce)?;
        state.reverts(target, &tx);
        state.submissions.push(Submission::Call {
            target,
            entrypoint: entrypoint.to_string(),
            args: args.to_vec(),
            nonce,
        });
        Ok(tx)
    }

    async fn transaction_status(&self, tx: &TxHandle) -> Result<TxStatus, ChainError> {
        let mut state = self.state();
        if state.flaky_polls > 0 {
            state.flaky_polls -= 1;
            return Err(ChainError::Transport("timed out".to_string()));
        }
        if state.reject_status_polls {
            return Err(ChainError::Rejected("transaction hash not found".to_string()));
        }
        if state.reverted.contains(&tx.tx_hash) {
            return Ok(TxStatus::Rejected("reverted".to_string()));
        }
        let never_confirm = state.never_confirm;
        let polls = state.polls.entry(tx.tx_hash).or_insert(0);
        *polls += 1;
        if never_confirm || *polls < 2 {
            Ok(TxStatus::Pending)
        } else {
            Ok(TxStatus::Confirmed)
        }
    }
}
