//! A simulation harness for the server NFT.
//!
//! Stands up a chain, deploys the blacklist, runs the project's deployment steps
//! directly, and then drives the NFT through its proxy.
//!
//! With `GAME_SERVER_ARTIFACTS` pointing at a directory of compiled artifacts, the
//! chain is a freshly spawned Anvil node running the compiled contracts. Otherwise
//! the harness falls back to the in-process chain with simulated contract code.

#![deny(missing_docs)]

use std::{env, path::Path};

use alloy::dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use eyre::{eyre, Result};
use scripts::{
    artifacts::{load_artifacts, ContractArtifact},
    config::MigrationConfig,
    constants::{
        BLACK_OR_WHITE_LIST, GAME_SERVER_ADMIN_ROLE, GAME_SERVER_NFT, GAME_SERVER_NFT_PROXY,
        GAME_SERVER_SUPER_ADMIN_ROLE, PROXY_ADMIN, PROXY_ADMIN_ROLE, PROXY_ADMIN_STORAGE_SLOT,
    },
    devnet::simulated_artifacts,
    migration::run_step,
    network::{DevNetwork, Network, RpcNetwork},
    registry::ContractRegistry,
    steps::{migrations, ContractStep},
    utils::address_from_slot,
};
use tracing::{info, warn};

/// The environment variable naming the compiled artifacts to run on Anvil
pub const ARTIFACTS_ENV_VAR: &str = "GAME_SERVER_ARTIFACTS";

/// The accounts the harness hands out: the base admin (the deployer), the proxy
/// admin, the operator, and three accounts holding no role
type Accounts = [Address; 6];

/// The server NFT deployed behind its proxy, with a cast of accounts
pub struct GameServerMarket {
    /// The network everything is deployed on
    pub net: Box<dyn Network>,
    /// Owner of the proxy's admin contract
    pub proxy_admin: Address,
    /// The deployer, bootstrapped as super admin by the initializer
    pub base_admin: Address,
    /// Granted admin by the post-deployment role grant
    pub operator: Address,
    /// Accounts holding no role
    pub non_admin: Address,
    /// See `non_admin`
    pub non_admin2: Address,
    /// See `non_admin`
    pub non_admin3: Address,
}

impl GameServerMarket {
    /// Deploy the blacklist, the logic, and the initialized proxy
    pub fn new() -> Result<Self> {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let (mut net, accounts) = match env::var_os(ARTIFACTS_ENV_VAR) {
            Some(dir) => anvil_network(Path::new(&dir))?,
            None => {
                warn!("{} is unset, running on the simulated chain", ARTIFACTS_ENV_VAR);
                simulated_network()?
            }
        };
        let [base_admin, proxy_admin, operator, non_admin, non_admin2, non_admin3] = accounts;

        // The blacklist is external to the project's migrations
        run_step(&mut *net, &mut ContractStep::new(BLACK_OR_WHITE_LIST))?;
        for mut step in migrations() {
            run_step(&mut *net, &mut *step)?;
        }

        let market =
            Self { net, proxy_admin, base_admin, operator, non_admin, non_admin2, non_admin3 };
        if market.proxy()?.address == Some(Address::ZERO) {
            return Err(eyre!("proxy deployed at the zero address"));
        }

        Ok(market)
    }

    /// A deployed contract by name
    pub fn contract(&self, name: &str) -> Result<ContractArtifact> {
        self.net
            .get_contract(name)
            .filter(|contract| contract.address.is_some())
            .cloned()
            .ok_or_else(|| eyre!("`{}` is not deployed", name))
    }

    /// The proxy, exposing the logic's interface
    pub fn proxy(&self) -> Result<ContractArtifact> {
        self.contract(GAME_SERVER_NFT_PROXY)
    }

    /// The logic contract at its own address
    pub fn logic(&self) -> Result<ContractArtifact> {
        self.contract(GAME_SERVER_NFT)
    }

    /// The admin contract the proxy created, read from the proxy's admin slot
    pub fn proxy_admin_contract(&self) -> Result<ContractArtifact> {
        let proxy = self.proxy()?.address.unwrap_or_default();
        let word = self.net.storage_at(proxy, PROXY_ADMIN_STORAGE_SLOT)?;
        let mut admin = self
            .net
            .get_contract(PROXY_ADMIN)
            .cloned()
            .ok_or_else(|| eyre!("no `{}` artifact", PROXY_ADMIN))?;
        admin.address = Some(address_from_slot(word));
        Ok(admin)
    }

    /// Send a transaction through the proxy from `from`
    pub fn proxy_execute(
        &mut self,
        from: Address,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<()> {
        let proxy = self.proxy()?;
        self.net.execute_from(from, &proxy, method, U256::ZERO, false, args)?;
        Ok(())
    }

    /// Call a view method through the proxy
    pub fn proxy_call(&mut self, method: &str, args: &[DynSolValue]) -> Result<Vec<DynSolValue>> {
        let proxy = self.proxy()?;
        let caller = self.non_admin;
        Ok(self.net.execute_from(caller, &proxy, method, U256::ZERO, true, args)?)
    }

    /// Call a view method directly on the logic contract
    pub fn logic_call(&mut self, method: &str, args: &[DynSolValue]) -> Result<Vec<DynSolValue>> {
        let logic = self.logic()?;
        let caller = self.non_admin;
        Ok(self.net.execute_from(caller, &logic, method, U256::ZERO, true, args)?)
    }

    // -----------
    // | Helpers |
    // -----------

    /// Whether `account` is an admin, through the proxy
    pub fn is_admin(&mut self, account: Address) -> Result<bool> {
        as_bool(self.proxy_call("isAdmin", &[DynSolValue::Address(account)])?)
    }

    /// Whether `account` holds the super admin role, through the proxy
    pub fn is_super_admin(&mut self, account: Address) -> Result<bool> {
        let role = first(self.proxy_call("SUPER_ADMIN_ROLE", &[])?)?;
        as_bool(self.proxy_call("hasRole", &[role, DynSolValue::Address(account)])?)
    }

    /// The id the next minted token will get
    pub fn next_token_id(&mut self) -> Result<U256> {
        as_uint(self.proxy_call("nextTokenId", &[])?)
    }

    /// Mint a token to `to` as `minter`, returning its id
    pub fn mint(
        &mut self,
        minter: Address,
        to: Address,
        server_id: &str,
        game_name: &str,
        developer: &str,
        metadata_uri: &str,
    ) -> Result<U256> {
        let args = [
            DynSolValue::Address(to),
            DynSolValue::String(server_id.to_string()),
            DynSolValue::String(game_name.to_string()),
            DynSolValue::String(developer.to_string()),
            DynSolValue::String(metadata_uri.to_string()),
        ];
        self.proxy_execute(minter, "mintServerNFT", &args)?;
        Ok(self.next_token_id()? - U256::from(1u64))
    }

    /// The metadata URI of a token
    pub fn token_uri(&mut self, token_id: U256) -> Result<String> {
        as_string(self.proxy_call("tokenURI", &[uint(token_id)])?)
    }

    /// The server id of a token, empty once burned
    pub fn server_id(&mut self, token_id: U256) -> Result<String> {
        as_string(self.proxy_call("getServerInfo", &[uint(token_id)])?)
    }

    /// The owner of a token
    pub fn owner_of(&mut self, token_id: U256) -> Result<Address> {
        first(self.proxy_call("ownerOf", &[uint(token_id)])?)?
            .as_address()
            .ok_or_else(|| eyre!("ownerOf did not return an address"))
    }
}

/// The roles the deployment binds, for the given cast
fn roles(accounts: &Accounts) -> MigrationConfig {
    let [base_admin, proxy_admin, operator, ..] = *accounts;
    MigrationConfig::default()
        .with_role(PROXY_ADMIN_ROLE, proxy_admin)
        .with_role(GAME_SERVER_SUPER_ADMIN_ROLE, base_admin)
        .with_role(GAME_SERVER_ADMIN_ROLE, operator)
}

/// A fresh Anvil node running the compiled artifacts in `dir`, casting its first
/// development accounts
fn anvil_network(dir: &Path) -> Result<(Box<dyn Network>, Accounts)> {
    let (_, artifacts) = load_artifacts(dir)?;
    let registry = ContractRegistry::new(artifacts);
    let net = RpcNetwork::spawn_anvil(registry, MigrationConfig::default(), true /* verify */)?;

    let accounts = net
        .accounts()
        .get(..6)
        .and_then(|accounts| Accounts::try_from(accounts).ok())
        .ok_or_else(|| eyre!("anvil exposes fewer than six accounts"))?;
    info!(artifacts = %dir.display(), deployer = %accounts[0], "running on anvil");

    Ok((Box::new(net.with_config(roles(&accounts))), accounts))
}

/// The in-process chain with simulated contract code
fn simulated_network() -> Result<(Box<dyn Network>, Accounts)> {
    let registry = ContractRegistry::new(simulated_artifacts()?);
    let mut net = DevNetwork::new(registry, MigrationConfig::default());

    let mut accounts = [net.sender(); 6];
    for account in accounts.iter_mut().skip(1) {
        *account = net.new_account();
    }

    Ok((Box::new(net.with_config(roles(&accounts))), accounts))
}

/// A `uint256` argument
pub fn uint(value: U256) -> DynSolValue {
    DynSolValue::Uint(value, 256)
}

/// An `address[]` argument
pub fn addresses(accounts: &[Address]) -> DynSolValue {
    DynSolValue::Array(accounts.iter().copied().map(DynSolValue::Address).collect())
}

/// A `string[]` argument
pub fn strings(values: &[&str]) -> DynSolValue {
    DynSolValue::Array(values.iter().map(|s| DynSolValue::String(s.to_string())).collect())
}

/// The first output of a call
pub fn first(outputs: Vec<DynSolValue>) -> Result<DynSolValue> {
    outputs.into_iter().next().ok_or_else(|| eyre!("call returned no outputs"))
}

/// The first output, as a `bool`
pub fn as_bool(outputs: Vec<DynSolValue>) -> Result<bool> {
    first(outputs)?.as_bool().ok_or_else(|| eyre!("expected a bool"))
}

/// The first output, as a `uint256`
pub fn as_uint(outputs: Vec<DynSolValue>) -> Result<U256> {
    first(outputs)?.as_uint().map(|(value, _)| value).ok_or_else(|| eyre!("expected a uint"))
}

/// The first output, as a `string`
pub fn as_string(outputs: Vec<DynSolValue>) -> Result<String> {
    first(outputs)?.as_str().map(str::to_string).ok_or_else(|| eyre!("expected a string"))
}
