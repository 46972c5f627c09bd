//! The migration config: role accounts, external contract addresses, and chain endpoints

use std::{collections::HashMap, fs, path::Path};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::errors::ScriptError;

/// An account bound to a named role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAccount {
    /// The account's address
    pub address: Address,
}

/// Connection details for a named chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// The chain's RPC url
    pub rpc_url: String,
    /// The expected chain id, checked against the node when present
    #[serde(default)]
    pub chain_id: Option<u64>,
}

/// The read-only configuration every deployment step is handed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Role name to account
    #[serde(default)]
    pub roles: HashMap<String, RoleAccount>,
    /// Addresses of contracts this project uses but does not deploy
    #[serde(default)]
    pub addresses: HashMap<String, Address>,
    /// Chain name to connection details
    #[serde(default)]
    pub chains: HashMap<String, ChainConfig>,
}

impl MigrationConfig {
    /// Read the config from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ScriptError::ReadFile(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents).map_err(|e| ScriptError::ConfigParsing(e.to_string()))
    }

    /// The address bound to `role`, or the zero address if the role is not configured
    pub fn role_address(&self, role: &str) -> Address {
        self.roles.get(role).map(|r| r.address).unwrap_or_default()
    }

    /// The address bound to `role`, failing if the role is absent or bound to the zero address
    pub fn require_role(&self, role: &str) -> Result<Address, ScriptError> {
        match self.role_address(role) {
            Address::ZERO => {
                Err(ScriptError::Unresolved(format!("role `{}` is not configured", role)))
            }
            address => Ok(address),
        }
    }

    /// Bind `role` to `address`
    pub fn with_role(mut self, role: &str, address: Address) -> Self {
        self.roles.insert(role.to_string(), RoleAccount { address });
        self
    }

    /// Record the address of an externally deployed contract
    pub fn with_address(mut self, name: &str, address: Address) -> Self {
        self.addresses.insert(name.to_string(), address);
        self
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, Address};
    use eyre::Result;

    use super::MigrationConfig;
    use crate::test_utils::scratch_dir;

    const CONFIG: &str = r#"{
        "roles": {
            "proxy_admin": {"address": "0x1111111111111111111111111111111111111111"},
            "game_server_admin_role": {"address": "0x0000000000000000000000000000000000000000"}
        },
        "addresses": {"BlackOrWhiteList": "0x2222222222222222222222222222222222222222"},
        "chains": {"local": {"rpc_url": "http://127.0.0.1:8545", "chain_id": 31337}}
    }"#;

    #[test]
    fn test_parse_config() -> Result<()> {
        let path = scratch_dir("config").join("config.json");
        std::fs::write(&path, CONFIG)?;

        let config = MigrationConfig::from_file(&path)?;
        assert_eq!(
            config.role_address("proxy_admin"),
            address!("1111111111111111111111111111111111111111")
        );
        assert_eq!(config.chains["local"].chain_id, Some(31337));
        assert_eq!(
            config.addresses["BlackOrWhiteList"],
            address!("2222222222222222222222222222222222222222")
        );

        Ok(())
    }

    #[test]
    fn test_missing_and_zero_roles() -> Result<()> {
        let path = scratch_dir("config-roles").join("config.json");
        std::fs::write(&path, CONFIG)?;
        let config = MigrationConfig::from_file(&path)?;

        assert_eq!(config.role_address("unknown"), Address::ZERO);
        assert!(config.require_role("unknown").is_err());
        assert!(config.require_role("game_server_admin_role").is_err());
        assert!(config.require_role("proxy_admin").is_ok());
        Ok(())
    }
}
