//! Loading compiled contract classes from the local build directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ArtifactError;

/// Default build output directory of `scarb build`.
pub const DEFAULT_ARTIFACTS_DIR: &str = "target/dev";

/// Default scarb package name prefixing every artifact file.
pub const DEFAULT_PACKAGE: &str = "fusd";

/// Compiled class documents of one contract.
///
/// Both documents are kept as raw JSON: the loader only guarantees they are
/// well-formed, interpreting them is up to the class hasher and the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    pub contract: String,
    /// Sierra class (`*.contract_class.json`).
    pub sierra: Value,
    /// CASM class (`*.compiled_contract_class.json`).
    pub casm: Value,
}

/// Reads `<dir>/<package>_<Contract>.{contract_class,compiled_contract_class}.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactLoader {
    pub dir: PathBuf,
    pub package: String,
}

impl Default for ArtifactLoader {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            package: DEFAULT_PACKAGE.to_string(),
        }
    }
}

impl ArtifactLoader {
    pub fn new(dir: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            package: package.into(),
        }
    }

    pub fn sierra_path(&self, contract: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}.contract_class.json", self.package, contract))
    }

    pub fn casm_path(&self, contract: &str) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.compiled_contract_class.json",
            self.package, contract
        ))
    }

    /// Load both compiled documents of `contract`.
    pub fn load(&self, contract: &str) -> Result<ContractArtifact, ArtifactError> {
        let sierra = read_json(contract, &self.sierra_path(contract))?;
        let casm = read_json(contract, &self.casm_path(contract))?;

        tracing::debug!(contract, dir = %self.dir.display(), "Loaded contract artifact");

        Ok(ContractArtifact {
            contract: contract.to_string(),
            sierra,
            casm,
        })
    }
}

fn read_json(contract: &str, path: &Path) -> Result<Value, ArtifactError> {
    let content = std::fs::read_to_string(path).map_err(|_| ArtifactError::NotFound {
        contract: contract.to_string(),
        path: path.to_path_buf(),
    })?;

    serde_json::from_str(&content).map_err(|e| ArtifactError::Parse {
        contract: contract.to_string(),
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
