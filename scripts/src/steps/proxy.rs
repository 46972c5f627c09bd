//! The step deploying a transparent upgradeable proxy in front of a logic contract.
//!
//! The proxy is deployed with the logic address, the owner of its admin contract, and
//! the encoded initializer call, so that initialization happens atomically with
//! deployment. Additional roles are granted through the proxy afterwards.

use alloy::dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use tracing::{info, warn};

use super::DeploymentStep;
use crate::{
    artifacts::ContractArtifact,
    constants::{PROXY_ADMIN_STORAGE_SLOT, PROXY_IMPLEMENTATION_STORAGE_SLOT},
    errors::ScriptError,
    network::{Network, Receipt},
    utils::{address_from_slot, filter_zero_addresses},
};

/// An argument of the logic contract's initializer, resolved at deployment time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitArg {
    /// The account bound to a role in the config; the role must be configured
    Role(String),
    /// The address of a contract, deployed in this run or configured externally.
    /// Resolves to the zero address, with a warning, if neither.
    Contract(String),
}

/// A post-deployment call granting a contract method's authority to the accounts
/// bound to a set of roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    /// The method taking the array of accounts to grant
    method: String,
    /// The roles whose accounts are granted
    roles: Vec<String>,
}

impl RoleGrant {
    /// Grant the accounts bound to `roles` through `method`
    pub fn new(method: &str, roles: &[&str]) -> Self {
        Self { method: method.to_string(), roles: roles.iter().map(|r| r.to_string()).collect() }
    }
}

/// Deploys a transparent proxy pointing at an already deployed logic contract
pub struct ProxyStep {
    /// The proxy contract to deploy
    target: String,
    /// The logic contract the proxy delegates to
    logic: String,
    /// The role whose account owns the proxy's admin contract
    admin_role: String,
    /// The logic's initializer method, if it is initialized on deployment
    init_method: Option<String>,
    /// The initializer's arguments
    init_args: Vec<InitArg>,
    /// The roles granted after deployment
    grant: Option<RoleGrant>,
    /// The proxy artifact bound at init
    artifact: Option<ContractArtifact>,
}

impl ProxyStep {
    /// A step deploying `target` in front of `logic`, administered by the account
    /// bound to `admin_role`
    pub fn new(target: &str, logic: &str, admin_role: &str) -> Self {
        Self {
            target: target.to_string(),
            logic: logic.to_string(),
            admin_role: admin_role.to_string(),
            init_method: None,
            init_args: Vec::new(),
            grant: None,
            artifact: None,
        }
    }

    /// Initialize the proxy by calling `method` on the logic with `args`
    pub fn initializer(mut self, method: &str, args: Vec<InitArg>) -> Self {
        self.init_method = Some(method.to_string());
        self.init_args = args;
        self
    }

    /// Grant additional roles after deployment
    pub fn grant(mut self, grant: RoleGrant) -> Self {
        self.grant = Some(grant);
        self
    }

    /// The logic contract, which must be registered with a non-zero address
    fn resolve_logic(&self, net: &dyn Network) -> Result<(ContractArtifact, Address), ScriptError> {
        let logic = net.get_contract(&self.logic).cloned().ok_or_else(|| {
            let msg = format!("logic contract `{}` is not in the registry", self.logic);
            ScriptError::Unresolved(msg)
        })?;

        match logic.address {
            Some(address) if address != Address::ZERO => Ok((logic, address)),
            _ => Err(ScriptError::Unresolved(format!(
                "logic contract `{}` has not been deployed",
                self.logic
            ))),
        }
    }

    /// The deployed proxy, exposing the logic's interface
    fn resolve_proxy(&self, net: &dyn Network) -> Result<ContractArtifact, ScriptError> {
        let (logic, _) = self.resolve_logic(net)?;
        let mut proxy = net
            .get_contract(&self.target)
            .filter(|proxy| proxy.address.is_some())
            .cloned()
            .ok_or_else(|| {
                ScriptError::Unresolved(format!("proxy `{}` has not been deployed", self.target))
            })?;

        proxy.logic = Some(Box::new(logic));
        Ok(proxy)
    }

    /// Resolve the initializer arguments against the config and registry
    fn resolve_init_args(&self, net: &dyn Network) -> Result<Vec<DynSolValue>, ScriptError> {
        self.init_args
            .iter()
            .map(|arg| match arg {
                InitArg::Role(role) => net.config().require_role(role).map(DynSolValue::Address),
                InitArg::Contract(name) => {
                    let address = net.get_address(name);
                    if address == Address::ZERO {
                        warn!(contract = %name, "initializer dependency is not deployed");
                    }
                    Ok(DynSolValue::Address(address))
                }
            })
            .collect()
    }
}

impl DeploymentStep for ProxyStep {
    fn target(&self) -> &str {
        &self.target
    }

    fn dependencies(&self) -> Vec<String> {
        vec![self.logic.clone()]
    }

    fn init(&mut self, artifact: ContractArtifact) {
        self.artifact = Some(artifact);
    }

    fn artifact(&self) -> Option<&ContractArtifact> {
        self.artifact.as_ref()
    }

    fn deployment(&mut self, net: &mut dyn Network) -> Result<Receipt, ScriptError> {
        let (logic, logic_address) = self.resolve_logic(net)?;
        let owner = net.config().require_role(&self.admin_role)?;

        let init_data = match &self.init_method {
            Some(method) => {
                let args = self.resolve_init_args(net)?;
                logic.encode_call(method, &args)?
            }
            None => Vec::new(),
        };

        let constructor_args = [
            DynSolValue::Address(logic_address),
            DynSolValue::Address(owner),
            DynSolValue::Bytes(init_data),
        ];

        let proxy = self
            .artifact
            .as_mut()
            .ok_or_else(|| ScriptError::Unresolved(format!("`{}` is not bound", self.target)))?;
        proxy.logic = Some(Box::new(logic));
        info!(proxy = %self.target, logic = %self.logic, owner = %owner, "deploying proxy");

        net.deploy(proxy, U256::ZERO, &constructor_args)
    }

    fn validation(&self, net: &dyn Network) -> Result<(), ScriptError> {
        let (_, logic_address) = self.resolve_logic(net)?;
        let proxy_address = self.resolve_proxy(net)?.address.unwrap_or_default();

        let implementation =
            address_from_slot(net.storage_at(proxy_address, PROXY_IMPLEMENTATION_STORAGE_SLOT)?);
        if implementation != logic_address {
            return Err(ScriptError::Validation(format!(
                "proxy `{}` points at {:#x}, expected logic `{}` at {:#x}",
                self.target, implementation, self.logic, logic_address
            )));
        }

        // The admin contract is created by the proxy, and only discoverable through its slot
        let proxy_admin =
            address_from_slot(net.storage_at(proxy_address, PROXY_ADMIN_STORAGE_SLOT)?);
        info!(proxy = %proxy_address, %implementation, %proxy_admin, "proxy wired to logic");

        Ok(())
    }

    fn execution(&mut self, net: &mut dyn Network) -> Result<(), ScriptError> {
        let Some(grant) = &self.grant else {
            return Ok(());
        };
        let proxy = self.resolve_proxy(net)?;

        let config = net.config();
        let accounts = filter_zero_addresses(
            grant.roles.iter().map(|role| (role.as_str(), config.role_address(role))),
        );
        if accounts.is_empty() {
            warn!(proxy = %self.target, method = %grant.method, "no accounts to grant, skipping");
            return Ok(());
        }

        let num_accounts = accounts.len();
        info!(proxy = %self.target, method = %grant.method, num_accounts, "granting roles");
        let args = [DynSolValue::Array(accounts.into_iter().map(DynSolValue::Address).collect())];
        net.execute_contract(&proxy, &grant.method, U256::ZERO, false /* is_static */, &args)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy::dyn_abi::DynSolValue;
    use alloy_primitives::{Address, U256};
    use alloy_sol_types::SolCall;
    use eyre::Result;

    use super::{InitArg, ProxyStep, RoleGrant};
    use crate::{
        config::MigrationConfig,
        constants::{
            BLACK_OR_WHITE_LIST, GAME_SERVER_ADMIN_ROLE, GAME_SERVER_NFT, GAME_SERVER_NFT_PROXY,
            GAME_SERVER_SUPER_ADMIN_ROLE, PROXY_ADMIN_ROLE,
        },
        devnet::simulated_artifacts,
        migration::{run_step, Migration, MigrationError, Phase, StepOutcome},
        network::{dev_account, DevNetwork, Network},
        registry::ContractRegistry,
        solidity::IGameServerNFT::grantAdminRolesCall,
        steps::{migrations, ContractStep, DeploymentStep},
    };

    /// A network with the logic contract deployed, and roles bound for the proxy
    /// admin, the super admin (the network's default sender), and two grantees
    fn setup() -> Result<DevNetwork> {
        let config = MigrationConfig::default()
            .with_role(PROXY_ADMIN_ROLE, dev_account(100))
            .with_role("super", dev_account(0))
            .with_role("first", dev_account(102))
            .with_role("zero", Address::ZERO)
            .with_role("second", dev_account(103));

        let registry = ContractRegistry::new(simulated_artifacts()?);
        let mut net = DevNetwork::new(registry, config);
        run_step(&mut net, &mut ContractStep::new(GAME_SERVER_NFT))?;
        Ok(net)
    }

    fn proxy_step(grant: &[&str]) -> ProxyStep {
        ProxyStep::new(GAME_SERVER_NFT_PROXY, GAME_SERVER_NFT, PROXY_ADMIN_ROLE)
            .initializer(
                "initialize",
                vec![
                    InitArg::Role("super".to_string()),
                    InitArg::Contract(BLACK_OR_WHITE_LIST.to_string()),
                ],
            )
            .grant(RoleGrant::new("grantAdminRoles", grant))
    }

    #[test]
    fn test_grant_skips_zero_addresses_in_order() -> Result<()> {
        let mut net = setup()?;
        run_step(&mut net, &mut proxy_step(&["first", "zero", "second"]))?;

        let grant = net.transactions().last().unwrap();
        assert!(grant.success);
        let call = grantAdminRolesCall::abi_decode(&grant.input, true)?;
        assert_eq!(call.accounts, vec![dev_account(102), dev_account(103)]);

        let proxy = net.get_contract(GAME_SERVER_NFT_PROXY).cloned().unwrap();
        let is_admin = net.execute_contract(
            &proxy,
            "isAdmin",
            U256::ZERO,
            true,
            &[DynSolValue::Address(dev_account(103))],
        )?;
        assert_eq!(is_admin, vec![DynSolValue::Bool(true)]);
        Ok(())
    }

    #[test]
    fn test_grant_of_only_zero_addresses_sends_nothing() -> Result<()> {
        let mut net = setup()?;
        run_step(&mut net, &mut proxy_step(&["zero", "unconfigured"]))?;

        // The logic and proxy deployments only
        assert_eq!(net.transactions().len(), 2);
        Ok(())
    }

    #[test]
    fn test_missing_logic_sends_no_transaction() -> Result<()> {
        let registry = ContractRegistry::new(simulated_artifacts()?);
        let config = MigrationConfig::default()
            .with_role(PROXY_ADMIN_ROLE, dev_account(100))
            .with_role("super", dev_account(101));
        let mut net = DevNetwork::new(registry, config);

        let mut step = proxy_step(&[]);
        step.init(net.get_contract(GAME_SERVER_NFT_PROXY).cloned().unwrap());
        assert!(step.deployment(&mut net).is_err());
        assert!(net.transactions().is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_admin_role_sends_no_transaction() -> Result<()> {
        let registry = ContractRegistry::new(simulated_artifacts()?);
        let config = MigrationConfig::default().with_role("super", dev_account(101));
        let mut net = DevNetwork::new(registry, config);
        run_step(&mut net, &mut ContractStep::new(GAME_SERVER_NFT))?;

        let mut step = proxy_step(&[]);
        step.init(net.get_contract(GAME_SERVER_NFT_PROXY).cloned().unwrap());
        assert!(step.deployment(&mut net).is_err());
        assert_eq!(net.transactions().len(), 1);
        Ok(())
    }

    #[test]
    fn test_validation_detects_wrong_implementation() -> Result<()> {
        let mut net = setup()?;
        let mut step = proxy_step(&[]);
        run_step(&mut net, &mut step)?;
        assert!(step.validation(&net).is_ok());

        // Point the registry's logic entry somewhere else
        let logic = net.get_contract(GAME_SERVER_NFT).cloned().unwrap();
        net.registry_mut().record_deployment(logic, Address::repeat_byte(0xee))?;
        assert!(step.validation(&net).is_err());
        Ok(())
    }

    #[test]
    fn test_failed_grant_is_resumed_without_redeploying() -> Result<()> {
        // The super admin is not the sender, so the grant reverts
        let config = MigrationConfig::default()
            .with_role(PROXY_ADMIN_ROLE, dev_account(100))
            .with_role(GAME_SERVER_SUPER_ADMIN_ROLE, dev_account(1))
            .with_role(GAME_SERVER_ADMIN_ROLE, dev_account(102));
        let mut net = DevNetwork::new(ContractRegistry::new(simulated_artifacts()?), config);

        let err = Migration::new(migrations(), "", "").run(&mut net).unwrap_err();
        assert_eq!(err.step(), Some(GAME_SERVER_NFT_PROXY));
        assert!(matches!(err, MigrationError::Step { phase: Phase::Execution, .. }));
        let proxy_address = net.registry().address(GAME_SERVER_NFT_PROXY);
        assert!(proxy_address.is_some());
        assert!(!net.registry().is_configured(GAME_SERVER_NFT_PROXY));

        // The next run sees only what the record kept, and sends from the super admin
        let record = net.registry().to_record("");
        let mut registry = ContractRegistry::new(simulated_artifacts()?);
        registry.seed(&record);
        *net.registry_mut() = registry;
        let super_admin = net.new_account();
        assert_eq!(super_admin, dev_account(1));
        net.set_sender(super_admin);
        let num_sent = net.transactions().len();

        let report = Migration::new(migrations(), "", "").run(&mut net)?;
        assert_eq!(report.num_deployed(), 0);
        assert_eq!(report.steps[0], StepOutcome::Skipped { target: GAME_SERVER_NFT.to_string() });
        assert_eq!(
            report.steps[1],
            StepOutcome::Resumed {
                target: GAME_SERVER_NFT_PROXY.to_string(),
                address: proxy_address.unwrap(),
            }
        );

        // The grant only
        assert_eq!(net.transactions().len(), num_sent + 1);
        let grant = net.transactions().last().unwrap();
        assert!(grant.success);
        let call = grantAdminRolesCall::abi_decode(&grant.input, true)?;
        assert_eq!(call.accounts, vec![dev_account(102)]);
        assert_eq!(net.registry().address(GAME_SERVER_NFT_PROXY), proxy_address);
        assert!(net.registry().is_configured(GAME_SERVER_NFT_PROXY));

        let proxy = net.get_contract(GAME_SERVER_NFT_PROXY).cloned().unwrap();
        let is_admin = net.execute_contract(
            &proxy,
            "isAdmin",
            U256::ZERO,
            true,
            &[DynSolValue::Address(dev_account(102))],
        )?;
        assert_eq!(is_admin, vec![DynSolValue::Bool(true)]);
        Ok(())
    }
}
