//! fusd is a CLI tool to deploy and wire the FUSD protocol contracts on Starknet.

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use cli::{Cli, Command};
use fusd_deploy::{
    CONFIG_FILENAME, DeployConfig, DeployError, DeploymentContext, DeploymentLedger,
    DeploymentPlan, DeploymentReport, Felt, LedgerStore, SierraClassHasher, StarknetChain,
    fusd_grants, run_full, run_grants,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Command::Deploy => deploy(&cli, &config).await,
        Command::GrantRoles => grant_roles(&cli, &config).await,
        Command::Status => status(&config),
    }
}

/// Defaults, then the TOML file, then `FUSD_*` variables, then flags.
fn load_config(cli: &Cli) -> Result<DeployConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));
    if cli.config.is_some() && !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }

    let mut config: DeployConfig = Figment::from(Serialized::defaults(DeployConfig::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("FUSD_").split("__"))
        .extract()
        .context(format!("Failed to load configuration from {}", path.display()))?;

    if let Some(rpc_url) = &cli.rpc_url {
        config.rpc_url = rpc_url.clone();
    }
    if let Some(account) = cli.account {
        config.account_address = Some(account);
    }
    if let Some(ledger) = &cli.ledger {
        config.ledger_path = ledger.clone();
    }
    if let Some(artifacts) = &cli.artifacts {
        config.artifacts.dir = artifacts.clone();
    }

    tracing::debug!(?config, "Configuration resolved");

    Ok(config)
}

async fn connect(cli: &Cli, config: &DeployConfig) -> Result<DeploymentContext<StarknetChain>> {
    let account = config.account()?;
    let private_key = cli
        .private_key
        .as_deref()
        .context("No private key provided, set FUSD_PRIVATE_KEY or --private-key")?;
    let private_key =
        Felt::from_hex(private_key).map_err(|_| anyhow::anyhow!("Private key is not a valid felt"))?;

    let chain = StarknetChain::connect(&config.rpc_url, account, private_key)
        .await
        .context(format!("Failed to connect to {}", config.rpc_url))?;

    let ledger = LedgerStore::open(&config.ledger_path).context(format!(
        "Failed to open ledger at {}",
        config.ledger_path.display()
    ))?;

    Ok(DeploymentContext::new(
        chain,
        ledger,
        config.confirmation.clone(),
    )?)
}

async fn deploy(cli: &Cli, config: &DeployConfig) -> Result<()> {
    let plan = DeploymentPlan::fusd(&config.plan)?;
    let mut ctx = connect(cli, config).await?;

    // Keep the resolved configuration next to the ledger for the next run.
    if cli.config.is_none() && !Path::new(CONFIG_FILENAME).exists() {
        config.save_to_file(Path::new(CONFIG_FILENAME))?;
    }

    tracing::info!(
        rpc_url = %config.rpc_url,
        ledger = %config.ledger_path.display(),
        contracts = plan.contracts.len(),
        "Starting FUSD deployment..."
    );

    let report = run_full(
        &mut ctx,
        &config.artifacts,
        SierraClassHasher,
        &plan,
        &fusd_grants(),
    )
    .await
    .map_err(halted)?;

    print_report(&report);
    print_ledger(ctx.ledger.ledger(), &plan);

    Ok(())
}

async fn grant_roles(cli: &Cli, config: &DeployConfig) -> Result<()> {
    let mut ctx = connect(cli, config).await?;

    let report = run_grants(&mut ctx, &fusd_grants()).await.map_err(halted)?;

    print_report(&report);

    Ok(())
}

fn status(config: &DeployConfig) -> Result<()> {
    let path = &config.ledger_path;
    if !path.exists() {
        println!("No deployment recorded at {}", path.display());
        return Ok(());
    }

    let ledger = DeploymentLedger::load_from_file(path)
        .context(format!("Failed to read ledger at {}", path.display()))?;
    let plan = DeploymentPlan::fusd(&config.plan)?;

    print_ledger(&ledger, &plan);

    Ok(())
}

/// Log the step a run stopped at, so it can be resumed.
fn halted(err: DeployError) -> anyhow::Error {
    match err.step() {
        Some(step) => tracing::error!(
            %step,
            retryable = err.is_retryable(),
            error = %err,
            "Deployment halted"
        ),
        None => tracing::error!(error = %err, "Deployment halted"),
    }
    anyhow::Error::new(err)
}

fn print_report(report: &DeploymentReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Stage", "Done", "Skipped"]);
    table.add_row(vec![
        "declare".to_string(),
        report.declared.len().to_string(),
        report.already_declared.len().to_string(),
    ]);
    table.add_row(vec![
        "deploy".to_string(),
        report.deployed.len().to_string(),
        report.already_deployed.len().to_string(),
    ]);
    table.add_row(vec![
        "grant".to_string(),
        report.granted.len().to_string(),
        report.already_granted.len().to_string(),
    ]);

    println!("{table}");
    println!("Transactions sent: {}", report.transactions);
}

fn print_ledger(ledger: &DeploymentLedger, plan: &DeploymentPlan) {
    let hex = |felt: Felt| format!("{:#x}", felt);

    let mut contracts = Table::new();
    contracts.load_preset(UTF8_FULL);
    contracts.set_header(vec!["Contract", "Address", "Class hash"]);
    for name in plan.names() {
        let address = match (ledger.address(name), ledger.pending_deployment(name)) {
            (Some(address), _) => hex(address),
            (None, Some(pending)) => format!("{} (pending)", hex(pending.address)),
            (None, None) => "not deployed".to_string(),
        };
        let class_hash = ledger.class_hash(name).map(hex);
        contracts.add_row(vec![
            name.to_string(),
            address,
            class_hash.unwrap_or_else(|| "-".to_string()),
        ]);
    }

    let mut grants = Table::new();
    grants.load_preset(UTF8_FULL);
    grants.set_header(vec!["Grant", "Transaction"]);
    for grant in fusd_grants() {
        let tx = match ledger.grant(&grant) {
            Some(record) if record.confirmed => hex(record.tx_hash),
            Some(record) => format!("{} (pending)", hex(record.tx_hash)),
            None => "not granted".to_string(),
        };
        grants.add_row(vec![grant.label(), tx]);
    }

    println!("{contracts}");
    println!("{grants}");
}
