//! Persistent record of what is deployed where.
//!
//! The ledger is the single source of truth shared by consecutive runs: a
//! resumed pipeline skips every deploy and grant it finds here, and the
//! grants-only command reads addresses from it without touching the plan.

use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;

use crate::{error::LedgerError, roles::RoleGrant, roles::Role};

/// Default ledger file name, in the working directory.
pub const DEFAULT_LEDGER_FILENAME: &str = "deployment_summary.json";

/// Current ledger format version.
pub const LEDGER_VERSION: u32 = 1;

/// A submitted contract deployment.
///
/// Recorded as soon as the deploy is accepted by the node, so a run that stops
/// while waiting can follow up on the same transaction instead of deploying a
/// second instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContract {
    pub address: Felt,
    /// Entries written before confirmation tracking existed are confirmed.
    #[serde(default = "confirmed_by_default")]
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_hash: Option<Felt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy_tx_hash: Option<Felt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<Felt>,
}

/// A submitted role grant, confirmed or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub target: String,
    pub role: Role,
    pub grantee: String,
    pub grantee_address: Felt,
    pub tx_hash: Felt,
    #[serde(default = "confirmed_by_default")]
    pub confirmed: bool,
}

fn confirmed_by_default() -> bool {
    true
}

impl GrantRecord {
    pub fn matches(&self, grant: &RoleGrant) -> bool {
        self.target == grant.target && self.role == grant.role && self.grantee == grant.grantee
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentLedger {
    pub version: u32,
    /// Account that performed the deployments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Felt>,
    /// Fingerprint of the plan the contracts were deployed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Contract name to class hash.
    #[serde(default)]
    pub classes: BTreeMap<String, Felt>,
    /// Contract name to deployment.
    #[serde(default)]
    pub contracts: BTreeMap<String, DeployedContract>,
    #[serde(default)]
    pub grants: Vec<GrantRecord>,
}

impl Default for DeploymentLedger {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            account: None,
            plan_hash: None,
            updated_at: None,
            classes: BTreeMap::new(),
            contracts: BTreeMap::new(),
            grants: Vec::new(),
        }
    }
}

/// On-disk formats accepted by [`DeploymentLedger::load_from_file`].
#[derive(Deserialize)]
#[serde(untagged)]
enum LedgerFile {
    Full(DeploymentLedger),
    /// Flat `{ name: address }` summary written by earlier deployment scripts.
    Summary(BTreeMap<String, Felt>),
}

impl DeploymentLedger {
    /// Address of a confirmed deployment.
    pub fn address(&self, contract: &str) -> Option<Felt> {
        self.contracts
            .get(contract)
            .filter(|deployed| deployed.confirmed)
            .map(|deployed| deployed.address)
    }

    /// A deployment that was submitted but not seen confirmed.
    pub fn pending_deployment(&self, contract: &str) -> Option<&DeployedContract> {
        self.contracts
            .get(contract)
            .filter(|deployed| !deployed.confirmed)
    }

    pub fn class_hash(&self, contract: &str) -> Option<Felt> {
        self.classes.get(contract).copied()
    }

    pub fn grant(&self, grant: &RoleGrant) -> Option<&GrantRecord> {
        self.grants.iter().find(|record| record.matches(grant))
    }

    pub fn record_class(&mut self, contract: &str, class_hash: Felt) {
        self.classes.insert(contract.to_string(), class_hash);
    }

    pub fn record_contract(&mut self, contract: &str, deployed: DeployedContract) {
        self.contracts.insert(contract.to_string(), deployed);
    }

    pub fn confirm_contract(&mut self, contract: &str) {
        if let Some(deployed) = self.contracts.get_mut(contract) {
            deployed.confirmed = true;
        }
    }

    /// Record a grant, replacing any earlier record of the same grant.
    pub fn record_grant(&mut self, record: GrantRecord) {
        self.grants.retain(|existing| {
            existing.target != record.target
                || existing.role != record.role
                || existing.grantee != record.grantee
        });
        self.grants.push(record);
    }

    pub fn confirm_grant(&mut self, grant: &RoleGrant) {
        for record in self.grants.iter_mut().filter(|record| record.matches(grant)) {
            record.confirmed = true;
        }
    }

    /// Parse a ledger from JSON, accepting the legacy flat summary.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        Ok(match serde_json::from_str(content)? {
            LedgerFile::Full(ledger) => ledger,
            LedgerFile::Summary(addresses) => Self {
                contracts: addresses
                    .into_iter()
                    .map(|(name, address)| {
                        let deployed = DeployedContract {
                            address,
                            confirmed: true,
                            class_hash: None,
                            deploy_tx_hash: None,
                            salt: None,
                        };
                        (name, deployed)
                    })
                    .collect(),
                ..Default::default()
            },
        })
    }

    /// Load the ledger from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, LedgerError> {
        let content = std::fs::read_to_string(path).map_err(|source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let ledger = Self::from_json(&content).map_err(|source| LedgerError::Format {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            contracts = ledger.contracts.len(),
            grants = ledger.grants.len(),
            "Ledger loaded"
        );
        Ok(ledger)
    }

    /// Write the ledger as pretty JSON, replacing the file atomically.
    pub fn save_to_file(&self, path: &Path) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Io {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_string_pretty(self).map_err(|source| LedgerError::Format {
            path: path.to_path_buf(),
            source,
        })?;

        let tmp_path = sibling(path, "tmp");
        std::fs::write(&tmp_path, json).map_err(io_err)?;
        std::fs::rename(&tmp_path, path).map_err(io_err)?;

        tracing::debug!(path = %path.display(), "Ledger saved");
        Ok(())
    }
}

/// `<path>.<suffix>`, next to `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// The ledger of a running pipeline.
///
/// Every update is written through to disk before the next on-chain step.
/// While open with a path, an exclusive lock on `<path>.lock` keeps a second
/// process from submitting transactions for the same deployment.
#[derive(Debug)]
pub struct LedgerStore {
    path: Option<PathBuf>,
    ledger: DeploymentLedger,
    _lock: Option<File>,
}

impl LedgerStore {
    /// A ledger that is never persisted.
    pub fn in_memory(ledger: DeploymentLedger) -> Self {
        Self {
            path: None,
            ledger,
            _lock: None,
        }
    }

    /// Lock and load the ledger at `path`, starting empty if it does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();

        let lock_path = sibling(&path, "lock");
        let lock = File::create(&lock_path).map_err(|source| LedgerError::Io {
            path: lock_path.clone(),
            source,
        })?;
        lock.try_lock_exclusive()
            .map_err(|_| LedgerError::Locked { path: path.clone() })?;

        let ledger = if path.exists() {
            DeploymentLedger::load_from_file(&path)?
        } else {
            tracing::info!(path = %path.display(), "No ledger found, starting a new one");
            DeploymentLedger::default()
        };

        Ok(Self {
            path: Some(path),
            ledger,
            _lock: Some(lock),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn ledger(&self) -> &DeploymentLedger {
        &self.ledger
    }

    pub fn into_ledger(self) -> DeploymentLedger {
        self.ledger
    }

    /// Tie the ledger to the deploying account.
    ///
    /// Addresses recorded by another account are not ours to resume from.
    pub fn bind_account(&mut self, account: Felt) -> Result<(), LedgerError> {
        match self.ledger.account {
            Some(recorded) if recorded != account => Err(LedgerError::AccountMismatch {
                recorded,
                current: account,
            }),
            Some(_) => Ok(()),
            None => self.update(|ledger| ledger.account = Some(account)),
        }
    }

    /// Record the plan fingerprint, warning if it differs from the recorded one.
    pub fn bind_plan(&mut self, plan_hash: String) -> Result<(), LedgerError> {
        if let Some(recorded) = self.ledger.plan_hash.as_deref() {
            if recorded == plan_hash {
                return Ok(());
            }
            tracing::warn!(
                recorded,
                current = %plan_hash,
                "Deployment plan changed since the ledger was written, \
                 existing deployments are kept as-is"
            );
        }
        self.update(|ledger| ledger.plan_hash = Some(plan_hash))
    }

    /// Apply `f` and persist the result.
    pub fn update<F>(&mut self, f: F) -> Result<(), LedgerError>
    where
        F: FnOnce(&mut DeploymentLedger),
    {
        f(&mut self.ledger);
        self.ledger.updated_at = Some(chrono::Utc::now().to_rfc3339());
        self.persist()
    }

    pub fn persist(&self) -> Result<(), LedgerError> {
        match &self.path {
            Some(path) => self.ledger.save_to_file(path),
            None => Ok(()),
        }
    }
}
