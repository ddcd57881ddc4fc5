use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fusd_deploy::Felt;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "fusd")]
#[command(
    author,
    version,
    about = "Deploy and wire the FUSD protocol contracts on Starknet"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "FUSD_VERBOSITY", default_value_t = LevelFilter::INFO, global = true)]
    pub verbosity: LevelFilter,

    /// Path to a TOML configuration file.
    ///
    /// If not provided, `Fusd.toml` in the working directory is used when it exists.
    #[arg(long, alias = "conf", env = "FUSD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// The URL of a Starknet JSON-RPC endpoint.
    #[arg(long, alias = "rpc", global = true)]
    pub rpc_url: Option<String>,

    /// Address of the deploying account.
    #[arg(long, value_parser = parse_felt, global = true)]
    pub account: Option<Felt>,

    /// Path to the deployment ledger.
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Directory holding the compiled contract classes.
    #[arg(long, global = true)]
    pub artifacts: Option<PathBuf>,

    /// Private key of the deploying account. Never written to disk.
    #[arg(long, env = "FUSD_PRIVATE_KEY", hide_env_values = true, global = true)]
    pub private_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Declare, deploy and wire every contract, resuming from the ledger.
    Deploy,
    /// Grant the protocol roles between already deployed contracts.
    GrantRoles,
    /// Print what the ledger records. Does not touch the chain.
    Status,
}

pub fn parse_felt(value: &str) -> Result<Felt, String> {
    Felt::from_hex(value).map_err(|_| format!("invalid felt: {value}"))
}
