//! The network facade deployment steps are written against.
//!
//! All operations block until the network has a definitive answer, so that a step's
//! deployment is committed and observable before the next step resolves it by name.

#[cfg(any(test, feature = "devnet"))]
mod dev;
mod rpc;

#[cfg(any(test, feature = "devnet"))]
pub use dev::{dev_account, DevNetwork, TxRecord};
pub use rpc::RpcNetwork;

use alloy::dyn_abi::DynSolValue;
use alloy_primitives::{Address, TxHash, B256, U256};

use crate::{
    artifacts::ContractArtifact, config::MigrationConfig, errors::ScriptError,
    registry::ContractRegistry,
};

/// The confirmation of a submitted deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    /// Whether the transaction succeeded
    pub success: bool,
    /// The address of the created contract
    pub deployed_address: Option<Address>,
    /// The transaction's hash
    pub transaction_hash: TxHash,
}

/// Deploys and interacts with contracts on behalf of a default sending account
pub trait Network {
    /// The contracts of this run
    fn registry(&self) -> &ContractRegistry;

    /// Mutable access to the contracts of this run
    fn registry_mut(&mut self) -> &mut ContractRegistry;

    /// The read-only migration config
    fn config(&self) -> &MigrationConfig;

    /// The account deployments and follow-up transactions are sent from
    fn sender(&self) -> Address;

    /// Deploy `contract` with the given value and constructor arguments,
    /// blocking until the deployment is mined
    fn deploy(
        &mut self,
        contract: &ContractArtifact,
        value: U256,
        args: &[DynSolValue],
    ) -> Result<Receipt, ScriptError>;

    /// Invoke `method` on a deployed contract from `from`.
    ///
    /// Static invocations are evaluated without a transaction and return the decoded
    /// outputs; others are sent as a transaction and return no outputs.
    fn execute_from(
        &mut self,
        from: Address,
        contract: &ContractArtifact,
        method: &str,
        value: U256,
        is_static: bool,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, ScriptError>;

    /// Read a raw storage slot of a deployed contract
    fn storage_at(&self, address: Address, slot: B256) -> Result<B256, ScriptError>;

    /// Invoke `method` on a deployed contract from the sender, see [`Network::execute_from`]
    fn execute_contract(
        &mut self,
        contract: &ContractArtifact,
        method: &str,
        value: U256,
        is_static: bool,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, ScriptError> {
        let from = self.sender();
        self.execute_from(from, contract, method, value, is_static, args)
    }

    /// The artifact registered under `name`
    fn get_contract(&self, name: &str) -> Option<&ContractArtifact> {
        self.registry().get(name)
    }

    /// The address `name` resolves to: its deployment in this run's registry, else
    /// its configured external address, else the zero address
    fn get_address(&self, name: &str) -> Address {
        self.registry()
            .address(name)
            .or_else(|| self.config().addresses.get(name).copied())
            .unwrap_or_default()
    }
}

/// Fail unless `contract` has been deployed
pub(crate) fn deployed_address(contract: &ContractArtifact) -> Result<Address, ScriptError> {
    contract.address.ok_or_else(|| {
        ScriptError::Unresolved(format!("`{}` has not been deployed", contract.name))
    })
}
