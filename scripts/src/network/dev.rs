//! A network facade backed by the in-process ephemeral chain

use alloy::dyn_abi::DynSolValue;
use alloy_primitives::{keccak256, Address, B256, U256};
use tracing::{info, warn};

use super::{deployed_address, Network, Receipt};
pub use crate::devnet::TxRecord;
use crate::{
    artifacts::ContractArtifact,
    config::MigrationConfig,
    devnet::{CodeBook, EphemeralChain},
    errors::ScriptError,
    registry::ContractRegistry,
};

/// The balance every development account starts with, one million ether
fn initial_balance() -> U256 {
    U256::from(10u64).pow(U256::from(24u64))
}

/// The `index`th deterministic development account
pub fn dev_account(index: u64) -> Address {
    Address::from_word(keccak256(format!("devnet account {}", index)))
}

/// A network facade running every deployment and call on an ephemeral chain.
///
/// Contract code is resolved by artifact name from a [`CodeBook`].
pub struct DevNetwork {
    /// The chain transactions run on
    chain: EphemeralChain,
    /// The simulated code deployed for each artifact name
    codes: CodeBook,
    /// The default sending account
    sender: Address,
    /// The number of development accounts handed out
    num_accounts: u64,
    /// The contracts of this run
    registry: ContractRegistry,
    /// The migration config
    config: MigrationConfig,
}

impl DevNetwork {
    /// A fresh chain with a funded default sender
    pub fn new(registry: ContractRegistry, config: MigrationConfig) -> Self {
        let mut network = Self {
            chain: EphemeralChain::new(),
            codes: CodeBook::standard(),
            sender: Address::ZERO,
            num_accounts: 0,
            registry,
            config,
        };
        network.sender = network.new_account();
        info!(sender = %network.sender, "started ephemeral chain");

        network
    }

    /// Replace the code book contracts are deployed from
    pub fn with_codes(mut self, codes: CodeBook) -> Self {
        self.codes = codes;
        self
    }

    /// Hand out a new funded account
    pub fn new_account(&mut self) -> Address {
        let account = dev_account(self.num_accounts);
        self.num_accounts += 1;
        self.chain.fund(account, initial_balance());
        account
    }

    /// Replace the migration config
    pub fn with_config(mut self, config: MigrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Send subsequent transactions from `sender`
    pub fn set_sender(&mut self, sender: Address) {
        self.sender = sender;
    }

    /// The underlying chain
    pub fn chain(&self) -> &EphemeralChain {
        &self.chain
    }

    /// Every transaction submitted so far
    pub fn transactions(&self) -> &[TxRecord] {
        self.chain.transactions()
    }
}

impl Network for DevNetwork {
    fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    fn registry_mut(&mut self) -> &mut ContractRegistry {
        &mut self.registry
    }

    fn config(&self) -> &MigrationConfig {
        &self.config
    }

    fn sender(&self) -> Address {
        self.sender
    }

    fn deploy(
        &mut self,
        contract: &ContractArtifact,
        value: U256,
        args: &[DynSolValue],
    ) -> Result<Receipt, ScriptError> {
        let code = self.codes.get(&contract.name).ok_or_else(|| {
            ScriptError::ContractDeployment(format!("no simulated code for `{}`", contract.name))
        })?;

        let creation_code = contract.creation_code(args)?;
        let constructor_args = &creation_code[contract.bytecode.len()..];
        let outcome = self.chain.create(self.sender, code, value, constructor_args);
        if let Err(revert) = &outcome.result {
            warn!(contract = %contract.name, %revert, "deployment reverted");
        }

        Ok(Receipt {
            success: outcome.result.is_ok(),
            deployed_address: outcome.created,
            transaction_hash: outcome.hash,
        })
    }

    fn execute_from(
        &mut self,
        from: Address,
        contract: &ContractArtifact,
        method: &str,
        value: U256,
        is_static: bool,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, ScriptError> {
        let to = deployed_address(contract)?;
        let calldata = contract.encode_call(method, args)?;

        if is_static {
            let output = self.chain.call(from, to, &calldata).map_err(|revert| {
                let msg = format!("{}.{}: {}", contract.name, method, revert);
                ScriptError::ContractInteraction(msg)
            })?;
            return contract.decode_output(method, args, &output);
        }

        let outcome = self.chain.transact(from, to, value, &calldata);
        outcome.result.map_err(|revert| {
            ScriptError::ContractInteraction(format!(
                "{}.{} reverted in {:#x}: {}",
                contract.name, method, outcome.hash, revert
            ))
        })?;

        Ok(Vec::new())
    }

    fn storage_at(&self, address: Address, slot: B256) -> Result<B256, ScriptError> {
        Ok(self.chain.storage_at(address, slot))
    }
}
