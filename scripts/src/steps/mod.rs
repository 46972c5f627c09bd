//! Deployment steps: the lifecycle each deployed contract goes through, and the
//! ordered migrations of this project

mod contract;
mod proxy;

pub use contract::ContractStep;
pub use proxy::{InitArg, ProxyStep, RoleGrant};

use crate::{
    artifacts::ContractArtifact,
    constants::{
        BLACK_OR_WHITE_LIST, GAME_SERVER_ADMIN_ROLE, GAME_SERVER_NFT, GAME_SERVER_NFT_PROXY,
        GAME_SERVER_SUPER_ADMIN_ROLE, GRANT_ADMIN_ROLES_METHOD, INITIALIZE_METHOD,
        PROXY_ADMIN_ROLE,
    },
    errors::ScriptError,
    network::{Network, Receipt},
    registry::ContractRegistry,
};

/// The lifecycle of a single contract deployment.
///
/// The migration engine drives a step through `init`, `loaded`, `deployment`,
/// `validation`, and `execution`, strictly in that order. A loaded step is skipped
/// entirely. A step whose contract is deployed but not configured skips only its
/// `deployment`, so a run that halted in `execution` is resumed on the same address.
pub trait DeploymentStep {
    /// The name of the contract this step deploys
    fn target(&self) -> &str;

    /// The contracts that must be deployed before this step runs
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Bind the step to its target's artifact. May be called repeatedly.
    fn init(&mut self, artifact: ContractArtifact);

    /// The bound artifact, as it should be recorded once deployed
    fn artifact(&self) -> Option<&ContractArtifact>;

    /// Whether the bound artifact already carries a deployed address
    fn deployed(&self) -> bool {
        self.artifact().is_some_and(|artifact| artifact.address.is_some())
    }

    /// Whether the target is deployed and configured, in which case the step is skipped
    fn loaded(&self, registry: &ContractRegistry) -> bool {
        self.deployed() && registry.is_configured(self.target())
    }

    /// Send the deployment transaction
    fn deployment(&mut self, net: &mut dyn Network) -> Result<Receipt, ScriptError>;

    /// Check the deployed contract; reads only
    fn validation(&self, _net: &dyn Network) -> Result<(), ScriptError> {
        Ok(())
    }

    /// Send post-deployment configuration transactions
    fn execution(&mut self, _net: &mut dyn Network) -> Result<(), ScriptError> {
        Ok(())
    }
}

/// The bound artifact of a step, failing if `init` has not been called
pub(crate) fn bound<'a>(
    artifact: &'a Option<ContractArtifact>,
    target: &str,
) -> Result<&'a ContractArtifact, ScriptError> {
    artifact.as_ref().ok_or_else(|| {
        ScriptError::Unresolved(format!("step for `{}` was never initialized", target))
    })
}

/// The deployment steps of the server NFT project, in execution order
pub fn migrations() -> Vec<Box<dyn DeploymentStep>> {
    vec![
        // 1. The server NFT logic contract
        Box::new(ContractStep::new(GAME_SERVER_NFT)),
        // 2. Its proxy, initialized with the super admin and the shared blacklist,
        //    after which the operational admins are granted
        Box::new(
            ProxyStep::new(GAME_SERVER_NFT_PROXY, GAME_SERVER_NFT, PROXY_ADMIN_ROLE)
                .initializer(
                    INITIALIZE_METHOD,
                    vec![
                        InitArg::Role(GAME_SERVER_SUPER_ADMIN_ROLE.to_string()),
                        InitArg::Contract(BLACK_OR_WHITE_LIST.to_string()),
                    ],
                )
                .grant(RoleGrant::new(GRANT_ADMIN_ROLES_METHOD, &[GAME_SERVER_ADMIN_ROLE])),
        ),
    ]
}
