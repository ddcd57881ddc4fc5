//! Deploying contract instances in plan order.

use rand::Rng;
use starknet::core::types::Felt;

use crate::{
    chain::{Chain, TxHandle},
    context::DeploymentContext,
    error::{DeployError, Step},
    ledger::DeployedContract,
    plan::{ContractSpec, DeploymentPlan},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Found in the ledger, nothing sent.
    AlreadyDeployed { address: Felt },
    /// A deployment submitted by an earlier run was confirmed, nothing sent.
    Resumed { address: Felt, tx_hash: Felt },
    Deployed {
        address: Felt,
        tx_hash: Felt,
        constructor_args: Vec<Felt>,
    },
}

impl DeployOutcome {
    pub fn address(&self) -> Felt {
        match self {
            Self::AlreadyDeployed { address }
            | Self::Resumed { address, .. }
            | Self::Deployed { address, .. } => *address,
        }
    }
}

/// Deploy one contract, unless the ledger already holds it.
///
/// Dependencies and the class hash are read from the ledger. The deployment
/// is written to the ledger as pending once the node accepts it, and marked
/// confirmed once the transaction lands. A pending deployment left by an
/// earlier run is followed up instead of being sent again; it is only
/// redeployed, with the same salt, if its transaction was reverted.
pub async fn deploy_contract<C: Chain>(
    ctx: &mut DeploymentContext<C>,
    spec: &ContractSpec,
) -> Result<DeployOutcome, DeployError> {
    let contract = spec.name.as_str();
    let step = Step::Deploy(contract.to_string());

    if let Some(address) = ctx.ledger.ledger().address(contract) {
        tracing::info!(
            contract,
            address = %format!("{:#x}", address),
            "Already deployed, skipping"
        );
        return Ok(DeployOutcome::AlreadyDeployed { address });
    }

    let mut salt = None;
    if let Some(pending) = ctx.ledger.ledger().pending_deployment(contract).cloned() {
        salt = pending.salt;
        if let Some(tx_hash) = pending.deploy_tx_hash {
            match resume_deployment(ctx, &step, contract, pending.address, tx_hash).await {
                Err(DeployError::DeployFailed { reason, .. }) => {
                    tracing::warn!(
                        contract,
                        tx_hash = %format!("{:#x}", tx_hash),
                        %reason,
                        "Earlier deployment was reverted, deploying again"
                    );
                }
                other => return other,
            }
        }
    }

    let ledger = ctx.ledger.ledger();
    let constructor_args =
        spec.resolve_constructor(ctx.account(), |name| ledger.address(name))?;
    let class_hash =
        ledger
            .class_hash(contract)
            .ok_or_else(|| DeployError::UnresolvedDependency {
                contract: contract.to_string(),
                dependency: format!("class of {contract}"),
            })?;

    let salt = salt.unwrap_or_else(|| Felt::from(rand::rng().random::<u64>()));
    let nonce = ctx.next_nonce().await?;

    tracing::info!(
        contract,
        nonce,
        args = constructor_args.len(),
        "Deploying contract..."
    );

    let submission = ctx
        .chain
        .submit_deploy(class_hash, &constructor_args, salt, nonce)
        .await
        .map_err(|e| DeployError::submission(&step, e))?;

    ctx.ledger.update(|ledger| {
        ledger.record_contract(
            contract,
            DeployedContract {
                address: submission.address,
                confirmed: false,
                class_hash: Some(class_hash),
                deploy_tx_hash: Some(submission.tx.tx_hash),
                salt: Some(salt),
            },
        )
    })?;

    ctx.confirm(&step, &submission.tx).await?;
    ctx.ledger.update(|ledger| ledger.confirm_contract(contract))?;

    tracing::info!(
        contract,
        address = %format!("{:#x}", submission.address),
        "Contract deployed"
    );

    Ok(DeployOutcome::Deployed {
        address: submission.address,
        tx_hash: submission.tx.tx_hash,
        constructor_args,
    })
}

async fn resume_deployment<C: Chain>(
    ctx: &mut DeploymentContext<C>,
    step: &Step,
    contract: &str,
    address: Felt,
    tx_hash: Felt,
) -> Result<DeployOutcome, DeployError> {
    tracing::info!(
        contract,
        tx_hash = %format!("{:#x}", tx_hash),
        "Found pending deployment, waiting for it..."
    );

    ctx.confirm(step, &TxHandle { tx_hash }).await?;
    ctx.ledger.update(|ledger| ledger.confirm_contract(contract))?;

    tracing::info!(
        contract,
        address = %format!("{:#x}", address),
        "Pending deployment confirmed"
    );

    Ok(DeployOutcome::Resumed { address, tx_hash })
}

/// Deploy the whole plan in order, halting on the first failure.
///
/// The order is the plan's: no sorting happens here, an out-of-order plan
/// fails with [`DeployError::UnresolvedDependency`] before anything is sent
/// for the offending contract.
pub async fn deploy_all<C: Chain>(
    ctx: &mut DeploymentContext<C>,
    plan: &DeploymentPlan,
) -> Result<Vec<(String, DeployOutcome)>, DeployError> {
    let mut outcomes = Vec::with_capacity(plan.contracts.len());
    for spec in &plan.contracts {
        let outcome = deploy_contract(ctx, spec).await?;
        outcomes.push((spec.name.clone(), outcome));
    }
    Ok(outcomes)
}
