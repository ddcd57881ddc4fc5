//! Deployment configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;

use crate::{
    artifacts::ArtifactLoader, chain::ConfirmationPolicy, ledger::DEFAULT_LEDGER_FILENAME,
    plan::PlanConfig, starknet_chain::DEFAULT_RPC_URL,
};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILENAME: &str = "Fusd.toml";

/// Everything a deployment needs except the signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Starknet JSON-RPC endpoint.
    pub rpc_url: String,
    /// Deploying account. Required by every command that touches the chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_address: Option<Felt>,
    pub artifacts: ArtifactLoader,
    /// Where the deployment ledger is kept.
    pub ledger_path: PathBuf,
    pub confirmation: ConfirmationPolicy,
    pub plan: PlanConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            account_address: None,
            artifacts: ArtifactLoader::default(),
            ledger_path: PathBuf::from(DEFAULT_LEDGER_FILENAME),
            confirmation: ConfirmationPolicy::default(),
            plan: PlanConfig::default(),
        }
    }
}

impl DeployConfig {
    /// The configured account, or an error naming how to set it.
    pub fn account(&self) -> Result<Felt> {
        self.account_address.context(
            "No account address configured, set `account_address`, FUSD_ACCOUNT_ADDRESS or --account",
        )
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deploy config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Fusd.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Configuration file or directory not found: {}", path.display());
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }
}
