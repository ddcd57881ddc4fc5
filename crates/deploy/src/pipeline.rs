//! The declare → deploy → grant pipeline.

use crate::{
    artifacts::ArtifactLoader,
    chain::Chain,
    configurator::{GrantOutcome, grant_all},
    context::DeploymentContext,
    declarer::{DeclareOutcome, Declarer},
    deployer::{DeployOutcome, deploy_all},
    error::DeployError,
    plan::DeploymentPlan,
    registry::ClassHasher,
    roles::RoleGrant,
};

/// Work done and skipped by one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentReport {
    /// Classes declared by this run.
    pub declared: Vec<String>,
    /// Classes found on-chain already.
    pub already_declared: Vec<String>,
    /// Contracts deployed by this run.
    pub deployed: Vec<String>,
    /// Contracts found in the ledger already.
    pub already_deployed: Vec<String>,
    /// Grants issued by this run, by label.
    pub granted: Vec<String>,
    /// Grants found in the ledger already, by label.
    pub already_granted: Vec<String>,
    /// Transactions submitted by this run.
    pub transactions: u64,
}

impl DeploymentReport {
    fn record_declares(&mut self, outcomes: Vec<(String, DeclareOutcome)>) {
        for (contract, outcome) in outcomes {
            match outcome {
                DeclareOutcome::Declared { .. } => self.declared.push(contract),
                DeclareOutcome::AlreadyDeclared { .. } => self.already_declared.push(contract),
            }
        }
    }

    fn record_deploys(&mut self, outcomes: Vec<(String, DeployOutcome)>) {
        for (contract, outcome) in outcomes {
            match outcome {
                DeployOutcome::Deployed { .. } | DeployOutcome::Resumed { .. } => {
                    self.deployed.push(contract)
                }
                DeployOutcome::AlreadyDeployed { .. } => self.already_deployed.push(contract),
            }
        }
    }

    fn record_grants(&mut self, outcomes: Vec<(RoleGrant, GrantOutcome)>) {
        for (grant, outcome) in outcomes {
            match outcome {
                GrantOutcome::Granted { .. } | GrantOutcome::Resumed { .. } => {
                    self.granted.push(grant.label())
                }
                GrantOutcome::AlreadyGranted { .. } => self.already_granted.push(grant.label()),
            }
        }
    }
}

/// Declare every class, deploy every contract, then grant every role.
pub async fn run_full<C, H>(
    ctx: &mut DeploymentContext<C>,
    artifacts: &ArtifactLoader,
    hasher: H,
    plan: &DeploymentPlan,
    grants: &[RoleGrant],
) -> Result<DeploymentReport, DeployError>
where
    C: Chain,
    H: ClassHasher,
{
    plan.validate()?;
    ctx.ledger.bind_plan(plan.fingerprint()?)?;

    let issued_before = ctx.nonces.issued();
    let mut report = DeploymentReport::default();

    tracing::info!(contracts = plan.contracts.len(), "Declaring classes...");
    let declarer = Declarer::new(artifacts, hasher);
    report.record_declares(declarer.declare_all(ctx, plan.names()).await?);

    tracing::info!("Deploying contracts...");
    report.record_deploys(deploy_all(ctx, plan).await?);

    tracing::info!("All contracts deployed! Setting up permissions...");
    report.record_grants(grant_all(ctx, grants).await?);

    report.transactions = ctx.nonces.issued() - issued_before;

    tracing::info!(
        declared = report.declared.len(),
        deployed = report.deployed.len(),
        granted = report.granted.len(),
        transactions = report.transactions,
        "Deployment and setup complete"
    );

    Ok(report)
}

/// Grant every role against an already populated ledger.
pub async fn run_grants<C: Chain>(
    ctx: &mut DeploymentContext<C>,
    grants: &[RoleGrant],
) -> Result<DeploymentReport, DeployError> {
    let issued_before = ctx.nonces.issued();
    let mut report = DeploymentReport::default();

    report.record_grants(grant_all(ctx, grants).await?);
    report.transactions = ctx.nonces.issued() - issued_before;

    tracing::info!(
        granted = report.granted.len(),
        skipped = report.already_granted.len(),
        "All permissions set"
    );

    Ok(report)
}
