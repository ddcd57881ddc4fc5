//! Granting access-control roles between deployed contracts.

use starknet::core::types::Felt;

use crate::{
    chain::{Chain, TxHandle},
    context::DeploymentContext,
    error::{DeployError, Step},
    ledger::{DeploymentLedger, GrantRecord},
    roles::{GRANT_ROLE_ENTRYPOINT, RoleGrant},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    AlreadyGranted { tx_hash: Felt },
    /// A grant submitted by an earlier run was confirmed, nothing sent.
    Resumed { tx_hash: Felt },
    Granted { tx_hash: Felt },
}

/// A grant with both ends resolved to addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGrant {
    pub grant: RoleGrant,
    pub target_address: Felt,
    pub grantee_address: Felt,
}

impl ResolvedGrant {
    pub fn calldata(&self) -> Vec<Felt> {
        vec![self.grant.role.id(), self.grantee_address]
    }
}

/// Resolve every grant against the ledger.
///
/// Fails on the first name without an address, so nothing is sent unless the
/// whole table can be wired.
pub fn resolve_grants(
    ledger: &DeploymentLedger,
    grants: &[RoleGrant],
) -> Result<Vec<ResolvedGrant>, DeployError> {
    grants
        .iter()
        .map(|grant| {
            let address = |contract: &str| {
                ledger
                    .address(contract)
                    .ok_or_else(|| DeployError::MissingAddress {
                        grant: grant.label(),
                        contract: contract.to_string(),
                    })
            };

            Ok(ResolvedGrant {
                target_address: address(&grant.target)?,
                grantee_address: address(&grant.grantee)?,
                grant: grant.clone(),
            })
        })
        .collect()
}

/// Issue every grant of the table that the ledger does not record yet.
pub async fn grant_all<C: Chain>(
    ctx: &mut DeploymentContext<C>,
    grants: &[RoleGrant],
) -> Result<Vec<(RoleGrant, GrantOutcome)>, DeployError> {
    let resolved = resolve_grants(ctx.ledger.ledger(), grants)?;

    let mut outcomes = Vec::with_capacity(resolved.len());
    for grant in resolved {
        let outcome = grant_role(ctx, &grant).await?;
        outcomes.push((grant.grant, outcome));
    }

    Ok(outcomes)
}

async fn grant_role<C: Chain>(
    ctx: &mut DeploymentContext<C>,
    resolved: &ResolvedGrant,
) -> Result<GrantOutcome, DeployError> {
    let grant = &resolved.grant;
    let step = Step::Grant(grant.label());

    if let Some(record) = ctx.ledger.ledger().grant(grant).cloned() {
        if record.grantee_address != resolved.grantee_address {
            tracing::warn!(
                grant = %grant.label(),
                "Recorded grant targets a different address, granting again"
            );
        } else if record.confirmed {
            tracing::info!(grant = %grant.label(), "Role already granted, skipping");
            return Ok(GrantOutcome::AlreadyGranted {
                tx_hash: record.tx_hash,
            });
        } else {
            match resume_grant(ctx, &step, grant, record.tx_hash).await {
                Err(DeployError::GrantFailed { reason, .. }) => {
                    tracing::warn!(
                        grant = %grant.label(),
                        %reason,
                        "Earlier grant was reverted, granting again"
                    );
                }
                other => return other,
            }
        }
    }

    let nonce = ctx.next_nonce().await?;

    tracing::info!(
        grant = %grant.label(),
        target = %format!("{:#x}", resolved.target_address),
        grantee = %format!("{:#x}", resolved.grantee_address),
        nonce,
        "Granting role..."
    );

    let tx = ctx
        .chain
        .submit_call(
            resolved.target_address,
            GRANT_ROLE_ENTRYPOINT,
            &resolved.calldata(),
            nonce,
        )
        .await
        .map_err(|e| DeployError::submission(&step, e))?;

    ctx.ledger.update(|ledger| {
        ledger.record_grant(GrantRecord {
            target: grant.target.clone(),
            role: grant.role,
            grantee: grant.grantee.clone(),
            grantee_address: resolved.grantee_address,
            tx_hash: tx.tx_hash,
            confirmed: false,
        })
    })?;

    ctx.confirm(&step, &tx).await?;
    ctx.ledger.update(|ledger| ledger.confirm_grant(grant))?;

    tracing::info!(
        grant = %grant.label(),
        tx_hash = %format!("{:#x}", tx.tx_hash),
        "Role granted"
    );

    Ok(GrantOutcome::Granted { tx_hash: tx.tx_hash })
}

async fn resume_grant<C: Chain>(
    ctx: &mut DeploymentContext<C>,
    step: &Step,
    grant: &RoleGrant,
    tx_hash: Felt,
) -> Result<GrantOutcome, DeployError> {
    tracing::info!(
        grant = %grant.label(),
        tx_hash = %format!("{:#x}", tx_hash),
        "Found pending grant, waiting for it..."
    );

    ctx.confirm(step, &TxHandle { tx_hash }).await?;
    ctx.ledger.update(|ledger| ledger.confirm_grant(grant))?;

    Ok(GrantOutcome::Resumed { tx_hash })
}
