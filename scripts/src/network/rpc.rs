//! A network facade backed by a JSON-RPC node, either remote or a local Anvil node
//! spawned for the run

use alloy::{
    dyn_abi::DynSolValue,
    network::{Ethereum, EthereumWallet, TransactionBuilder},
    node_bindings::{Anvil, AnvilInstance},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use alloy_primitives::{Address, B256, U256};
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};
use tracing::info;

use super::{deployed_address, Network, Receipt};
use crate::{
    artifacts::ContractArtifact, config::MigrationConfig, errors::ScriptError,
    registry::ContractRegistry,
};

/// A network facade sending signed transactions to an RPC node.
///
/// Each request is driven to completion on an owned runtime before returning.
pub struct RpcNetwork {
    /// The runtime requests are driven on
    runtime: Runtime,
    /// The signing provider
    provider: DynProvider<Ethereum>,
    /// The default sending account
    sender: Address,
    /// Every account the provider's wallet can sign for
    signers: Vec<Address>,
    /// The contracts of this run
    registry: ContractRegistry,
    /// The migration config
    config: MigrationConfig,
    /// Whether to check that deployments left runtime code behind
    verify_code: bool,
    /// The Anvil node this network spawned, killed when the network is dropped
    _node: Option<AnvilInstance>,
}

impl RpcNetwork {
    /// Connect to the node at `rpc_url`, signing with `signer`.
    ///
    /// If `expected_chain_id` is given, the node must report the same chain id.
    pub fn connect(
        rpc_url: &str,
        signer: PrivateKeySigner,
        expected_chain_id: Option<u64>,
        registry: ContractRegistry,
        config: MigrationConfig,
        verify_code: bool,
    ) -> Result<Self, ScriptError> {
        let signers = vec![signer.address()];
        let wallet = EthereumWallet::from(signer);
        Self::open(rpc_url, wallet, signers, expected_chain_id, registry, config, verify_code)
    }

    /// Spawn a local Anvil node and connect to it, able to sign for every one of its
    /// development accounts. The first account is the default sender.
    ///
    /// Requires the `anvil` binary on the `PATH`.
    pub fn spawn_anvil(
        registry: ContractRegistry,
        config: MigrationConfig,
        verify_code: bool,
    ) -> Result<Self, ScriptError> {
        let node = Anvil::new().try_spawn().map_err(|e| {
            ScriptError::ClientInitialization(format!("failed to spawn anvil: {}", e))
        })?;

        let mut keys = node.keys().iter().cloned().map(PrivateKeySigner::from);
        let first = keys.next().ok_or_else(|| {
            ScriptError::ClientInitialization("anvil exposed no accounts".to_string())
        })?;
        let mut wallet = EthereumWallet::from(first);
        for signer in keys {
            wallet.register_signer(signer);
        }

        let signers = node.addresses().to_vec();
        let chain_id = Some(node.chain_id());
        let mut net =
            Self::open(&node.endpoint(), wallet, signers, chain_id, registry, config, verify_code)?;
        net._node = Some(node);
        Ok(net)
    }

    /// Open a provider signing with `wallet`, with the first of `signers` as the sender
    fn open(
        rpc_url: &str,
        wallet: EthereumWallet,
        signers: Vec<Address>,
        expected_chain_id: Option<u64>,
        registry: ContractRegistry,
        config: MigrationConfig,
        verify_code: bool,
    ) -> Result<Self, ScriptError> {
        let runtime = RuntimeBuilder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;

        let url =
            Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
        let sender = signers
            .first()
            .copied()
            .ok_or_else(|| ScriptError::ClientInitialization("no signing account".to_string()))?;
        let provider = DynProvider::new(ProviderBuilder::new().wallet(wallet).on_http(url));

        let chain_id = runtime
            .block_on(async { provider.get_chain_id().await })
            .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
        if let Some(expected) = expected_chain_id {
            if expected != chain_id {
                return Err(ScriptError::ClientInitialization(format!(
                    "node reports chain id {}, config expects {}",
                    chain_id, expected
                )));
            }
        }
        info!(rpc_url, chain_id, sender = %sender, "connected to node");

        Ok(Self {
            runtime,
            provider,
            sender,
            signers,
            registry,
            config,
            verify_code,
            _node: None,
        })
    }

    /// Replace the migration config
    pub fn with_config(mut self, config: MigrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Every account this network can send from, the default sender first
    pub fn accounts(&self) -> &[Address] {
        &self.signers
    }

    /// Send subsequent transactions from `sender`, which must be one of the signers
    pub fn set_sender(&mut self, sender: Address) -> Result<(), ScriptError> {
        if !self.signers.contains(&sender) {
            return Err(ScriptError::ClientInitialization(format!("no signer for {:#x}", sender)));
        }

        self.sender = sender;
        Ok(())
    }

    /// Send `tx` and wait for its receipt
    fn send(&self, tx: TransactionRequest) -> Result<Receipt, ScriptError> {
        let receipt = self.runtime.block_on(async {
            let pending = self
                .provider
                .send_transaction(tx)
                .await
                .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
            pending
                .get_receipt()
                .await
                .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
        })?;

        Ok(Receipt {
            success: receipt.status(),
            deployed_address: receipt.contract_address,
            transaction_hash: receipt.transaction_hash,
        })
    }
}

impl Network for RpcNetwork {
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
        let code = contract.creation_code(args)?;
        let tx = TransactionRequest::default()
            .with_from(self.sender)
            .with_deploy_code(code)
            .with_value(value);

        let receipt = self
            .send(tx)
            .map_err(|e| ScriptError::ContractDeployment(format!("{}: {}", contract.name, e)))?;

        if self.verify_code {
            if let Some(address) = receipt.deployed_address {
                let code = self
                    .runtime
                    .block_on(async { self.provider.get_code_at(address).await })
                    .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
                if code.is_empty() {
                    return Err(ScriptError::ContractDeployment(format!(
                        "{} left no runtime code at {:#x}",
                        contract.name, address
                    )));
                }
            }
        }

        Ok(receipt)
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
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(calldata)
            .with_value(value);

        if is_static {
            let output = self
                .runtime
                .block_on(async { self.provider.call(&tx).await })
                .map_err(|e| ScriptError::ContractInteraction(format!("{}: {}", method, e)))?;
            return contract.decode_output(method, args, &output);
        }

        let receipt = self.send(tx)?;
        if !receipt.success {
            return Err(ScriptError::ContractInteraction(format!(
                "{}.{} reverted in {:#x}",
                contract.name, method, receipt.transaction_hash
            )));
        }

        Ok(Vec::new())
    }

    fn storage_at(&self, address: Address, slot: B256) -> Result<B256, ScriptError> {
        let word = self
            .runtime
            .block_on(async {
                self.provider.get_storage_at(address, U256::from_be_bytes(slot.0)).await
            })
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

        Ok(B256::from(word.to_be_bytes::<32>()))
    }
}
