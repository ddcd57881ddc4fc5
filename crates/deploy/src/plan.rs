//! The static deployment plan: which contracts, in which order, with which
//! constructor arguments.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use starknet::core::types::Felt;

use crate::error::DeployError;

/// One constructor argument, resolved at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ConstructorArg {
    /// Address of the deploying account.
    Account,
    /// Deployed address of another contract of the plan.
    Contract(String),
    Felt(Felt),
    /// Cairo `u256`, encoded as `low, high`.
    Uint256(u128),
    /// Cairo `Array<felt252>`, encoded length-prefixed.
    Array(Vec<Felt>),
}

impl ConstructorArg {
    pub fn contract(name: impl Into<String>) -> Self {
        Self::Contract(name.into())
    }
}

/// A contract to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    pub name: String,
    /// Contracts whose deployed addresses feed the constructor.
    pub depends_on: Vec<String>,
    pub constructor: Vec<ConstructorArg>,
}

impl ContractSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            constructor: Vec::new(),
        }
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.depends_on.push(dependency.into());
        self
    }

    pub fn arg(mut self, arg: ConstructorArg) -> Self {
        self.constructor.push(arg);
        self
    }

    /// Resolve the constructor calldata.
    ///
    /// `lookup` returns the confirmed address of a deployed contract. Every
    /// `depends_on` entry is checked even if no argument uses it.
    pub fn resolve_constructor<F>(&self, account: Felt, lookup: F) -> Result<Vec<Felt>, DeployError>
    where
        F: Fn(&str) -> Option<Felt>,
    {
        let unresolved = |dependency: &str| DeployError::UnresolvedDependency {
            contract: self.name.clone(),
            dependency: dependency.to_string(),
        };

        for dependency in &self.depends_on {
            lookup(dependency).ok_or_else(|| unresolved(dependency))?;
        }

        let mut calldata = Vec::with_capacity(self.constructor.len());
        for arg in &self.constructor {
            match arg {
                ConstructorArg::Account => calldata.push(account),
                ConstructorArg::Contract(name) => {
                    calldata.push(lookup(name).ok_or_else(|| unresolved(name))?)
                }
                ConstructorArg::Felt(value) => calldata.push(*value),
                ConstructorArg::Uint256(value) => {
                    calldata.push(Felt::from(*value));
                    calldata.push(Felt::ZERO);
                }
                ConstructorArg::Array(values) => {
                    calldata.push(Felt::from(values.len() as u64));
                    calldata.extend_from_slice(values);
                }
            }
        }

        Ok(calldata)
    }
}

/// Ordered list of contracts. The order is the deployment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub contracts: Vec<ContractSpec>,
}

impl DeploymentPlan {
    pub fn new(contracts: Vec<ContractSpec>) -> Self {
        Self { contracts }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.contracts.iter().map(|spec| spec.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&ContractSpec> {
        self.contracts.iter().find(|spec| spec.name == name)
    }

    /// Check names are unique, every referenced contract is a declared
    /// dependency, and every dependency comes earlier in the plan.
    pub fn validate(&self) -> Result<(), DeployError> {
        let mut seen = HashSet::new();

        for spec in &self.contracts {
            for dependency in &spec.depends_on {
                if !seen.contains(dependency.as_str()) {
                    return Err(DeployError::Plan(format!(
                        "{} depends on {}, which is not deployed before it",
                        spec.name, dependency
                    )));
                }
            }

            for arg in &spec.constructor {
                match arg {
                    ConstructorArg::Contract(name) if !spec.depends_on.contains(name) => {
                        return Err(DeployError::Plan(format!(
                            "{} uses the address of {} without depending on it",
                            spec.name, name
                        )));
                    }
                    _ => {}
                }
            }

            if !seen.insert(spec.name.as_str()) {
                return Err(DeployError::Plan(format!(
                    "{} appears twice in the plan",
                    spec.name
                )));
            }
        }

        Ok(())
    }

    /// SHA-256 over the serialized plan, hex-encoded.
    ///
    /// Stored in the ledger so a resumed run can tell the plan changed.
    pub fn fingerprint(&self) -> Result<String, DeployError> {
        let json = serde_json::to_vec(&self.contracts)
            .map_err(|e| DeployError::Plan(format!("failed to serialize plan: {e}")))?;
        Ok(hex::encode(Sha256::digest(&json)))
    }
}

/// Inputs of the FUSD plan that are not addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Initial FUSD supply in base units, as a decimal string.
    pub initial_supply: String,
    /// Price sources handed to the oracle adapter.
    pub oracle_sources: Vec<Felt>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            initial_supply: "1000000000000000000".to_string(),
            oracle_sources: vec![Felt::from(1u64), Felt::from(2u64), Felt::from(3u64)],
        }
    }
}

pub const TREASURY: &str = "Treasury";
pub const ORACLE_ADAPTER: &str = "OracleAdapter";
pub const FUSD_TOKEN: &str = "FUSDToken";
pub const STAKING: &str = "Staking";
pub const BOND_TOKEN: &str = "BondToken";
pub const BOND_AUCTION: &str = "BondAuction";
pub const LIQUIDITY_MANAGER: &str = "LiquidityManager";
pub const MONETARY_POLICY: &str = "MonetaryPolicy";

impl DeploymentPlan {
    /// The FUSD protocol plan.
    pub fn fusd(config: &PlanConfig) -> Result<Self, DeployError> {
        use ConstructorArg::{Account, Array, Uint256};

        let initial_supply: u128 = config.initial_supply.parse().map_err(|e| {
            DeployError::Plan(format!(
                "invalid initial supply {:?}: {e}",
                config.initial_supply
            ))
        })?;

        let monetary_policy_deps = [
            FUSD_TOKEN,
            ORACLE_ADAPTER,
            TREASURY,
            LIQUIDITY_MANAGER,
            STAKING,
            BOND_TOKEN,
            BOND_AUCTION,
        ];
        let monetary_policy = monetary_policy_deps
            .iter()
            .fold(ContractSpec::new(MONETARY_POLICY), |spec, dep| {
                spec.depends_on(*dep).arg(ConstructorArg::contract(*dep))
            })
            .arg(Account);

        let plan = Self::new(vec![
            ContractSpec::new(TREASURY).arg(Account),
            ContractSpec::new(ORACLE_ADAPTER)
                .arg(Array(config.oracle_sources.clone()))
                .arg(Account),
            ContractSpec::new(FUSD_TOKEN)
                .arg(Uint256(initial_supply))
                .arg(Account)
                .arg(Account),
            ContractSpec::new(STAKING)
                .depends_on(FUSD_TOKEN)
                .arg(ConstructorArg::contract(FUSD_TOKEN))
                .arg(Account),
            ContractSpec::new(BOND_TOKEN).arg(Account),
            ContractSpec::new(BOND_AUCTION)
                .depends_on(FUSD_TOKEN)
                .depends_on(BOND_TOKEN)
                .arg(ConstructorArg::contract(FUSD_TOKEN))
                .arg(ConstructorArg::contract(BOND_TOKEN))
                .arg(Account),
            ContractSpec::new(LIQUIDITY_MANAGER)
                .depends_on(FUSD_TOKEN)
                .arg(ConstructorArg::contract(FUSD_TOKEN))
                .arg(Account),
            monetary_policy,
        ]);

        plan.validate()?;
        Ok(plan)
    }
}
