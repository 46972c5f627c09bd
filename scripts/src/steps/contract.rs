//! The step deploying a plain, non-upgradeable contract

use alloy_primitives::U256;

use super::{bound, DeploymentStep};
use crate::{
    artifacts::ContractArtifact,
    errors::ScriptError,
    network::{Network, Receipt},
};

/// Deploys a contract's bytecode with no constructor arguments and no value
pub struct ContractStep {
    /// The contract to deploy
    target: String,
    /// The artifact bound at init
    artifact: Option<ContractArtifact>,
}

impl ContractStep {
    /// A step deploying the contract named `target`
    pub fn new(target: &str) -> Self {
        Self { target: target.to_string(), artifact: None }
    }
}

impl DeploymentStep for ContractStep {
    fn target(&self) -> &str {
        &self.target
    }

    fn init(&mut self, artifact: ContractArtifact) {
        self.artifact = Some(artifact);
    }

    fn artifact(&self) -> Option<&ContractArtifact> {
        self.artifact.as_ref()
    }

    fn deployment(&mut self, net: &mut dyn Network) -> Result<Receipt, ScriptError> {
        let artifact = bound(&self.artifact, &self.target)?;
        net.deploy(artifact, U256::ZERO, &[])
    }
}
