//! Access-control roles and the post-deployment grant table.

use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;

use crate::plan::{BOND_AUCTION, BOND_TOKEN, FUSD_TOKEN, MONETARY_POLICY, STAKING};

/// Entrypoint used on every access-controlled contract.
pub const GRANT_ROLE_ENTRYPOINT: &str = "grant_role";

/// Role identifiers understood by the FUSD contracts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Minter,
    Burner,
}

impl Role {
    /// The role as a Cairo short string (`'MINTER'`).
    pub fn id(&self) -> Felt {
        Felt::from_bytes_be_slice(self.as_ref().as_bytes())
    }
}

/// "`grantee` holds `role` on `target`", by contract name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub target: String,
    pub role: Role,
    pub grantee: String,
}

impl RoleGrant {
    pub fn new(target: impl Into<String>, role: Role, grantee: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            role,
            grantee: grantee.into(),
        }
    }

    /// Human-readable label used in logs and errors.
    pub fn label(&self) -> String {
        format!("{} on {} to {}", self.role, self.target, self.grantee)
    }
}

/// Grants wiring the FUSD contracts together.
pub fn fusd_grants() -> Vec<RoleGrant> {
    vec![
        RoleGrant::new(FUSD_TOKEN, Role::Minter, MONETARY_POLICY),
        RoleGrant::new(FUSD_TOKEN, Role::Burner, BOND_AUCTION),
        RoleGrant::new(BOND_TOKEN, Role::Minter, BOND_AUCTION),
        RoleGrant::new(STAKING, Role::Admin, MONETARY_POLICY),
    ]
}
