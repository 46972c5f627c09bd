//! Constants used in the migration scripts

use alloy_primitives::{b256, B256};

/// The name of the server NFT logic contract
pub const GAME_SERVER_NFT: &str = "GameServerNFT";

/// The name of the transparent proxy fronting the server NFT
pub const GAME_SERVER_NFT_PROXY: &str = "GameServerNFTProxy";

/// The name of the externally deployed blacklist contract
pub const BLACK_OR_WHITE_LIST: &str = "BlackOrWhiteList";

/// The name of the admin contract created by a transparent proxy
pub const PROXY_ADMIN: &str = "ProxyAdmin";

/// The role whose account owns the proxy admin contract
pub const PROXY_ADMIN_ROLE: &str = "proxy_admin";

/// The role bootstrapped as super admin by the server NFT initializer
pub const GAME_SERVER_SUPER_ADMIN_ROLE: &str = "game_server_super_admin";

/// The role granted operational admin rights after deployment
pub const GAME_SERVER_ADMIN_ROLE: &str = "game_server_admin_role";

/// The name of the initializer method on upgradeable logic contracts
pub const INITIALIZE_METHOD: &str = "initialize";

/// The server NFT method granting admin rights to a batch of accounts
pub const GRANT_ADMIN_ROLES_METHOD: &str = "grantAdminRoles";

/// The storage slot containing the implementation address in an upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const PROXY_IMPLEMENTATION_STORAGE_SLOT: B256 =
    b256!("360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: B256 =
    b256!("b53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103");

/// The number of bytes stored in a single storage slot
pub const NUM_BYTES_STORAGE_SLOT: usize = 32;

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;

/// The name of the deployments record file kept per chain in the data directory
pub const DEPLOYMENTS_FILE_NAME: &str = "deployments.json";

/// The environment variable holding the keystore password
pub const KEYSTORE_PASSWORD_ENV_VAR: &str = "KEYSTORE_PASSWORD";

/// The default RPC url, used when neither the CLI nor the config names one
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// The extension of compiled contract artifacts
pub const ARTIFACT_EXTENSION: &str = "json";

/// The separator between names in the migration filter
pub const FILTER_SEPARATOR: char = ',';
