//! Definitions of Solidity interfaces called during and after deployment

use alloy_sol_types::sol;

sol! {
    /// The upgradeable server NFT, reached through its proxy
    #[sol(abi)]
    interface IGameServerNFT {
        function initialize(address superAdmin, address blacklist) external;
        function SUPER_ADMIN_ROLE() external view returns (bytes32);
        function ADMIN_ROLE() external view returns (bytes32);
        function hasRole(bytes32 role, address account) external view returns (bool);
        function isAdmin(address account) external view returns (bool);
        function grantAdminRoles(address[] accounts) external;
        function revokeAdminRoles(address[] accounts) external;
        function changeSuperAdmin(address newSuperAdmin) external;
        function blacklist() external view returns (address);
        function mintServerNFT(
            address to,
            string serverId,
            string gameName,
            string developer,
            string metadataURI
        ) external returns (uint256);
        function batchMintServerNFT(
            address[] recipients,
            string[] serverIds,
            string[] gameNames,
            string[] developers,
            string[] metadataURIs
        ) external;
        function burnServerNFT(uint256 tokenId) external;
        function setTokenURI(uint256 tokenId, string uri) external;
        function nextTokenId() external view returns (uint256);
        function tokenURI(uint256 tokenId) external view returns (string);
        function getServerInfo(uint256 tokenId)
            external
            view
            returns (string serverId, string gameName, string developer);
        function ownerOf(uint256 tokenId) external view returns (address);
        function balanceOf(address owner) external view returns (uint256);
        function balanceOfAll(address owner) external view returns (uint256[]);
        function approve(address to, uint256 tokenId) external;
        function getApproved(uint256 tokenId) external view returns (address);
        function transferFrom(address from, address to, uint256 tokenId) external;
        function safeTransferFrom(address from, address to, uint256 tokenId) external;
        function supportsInterface(bytes4 interfaceId) external view returns (bool);
    }

    /// The blacklist shared across projects
    #[sol(abi)]
    interface IBlackOrWhiteList {
        function owner() external view returns (address);
        function isBlacklisted(address account) external view returns (bool);
        function setBlacklisted(address account, bool blacklisted) external;
    }

    /// The admin-only surface of a transparent upgradeable proxy
    interface ITransparentUpgradeableProxy {
        function upgradeToAndCall(address newImplementation, bytes data) external payable;
    }

    /// The contract a transparent proxy creates to own its upgrades
    #[sol(abi)]
    interface IProxyAdmin {
        function owner() external view returns (address);
        function upgradeAndCall(address proxy, address implementation, bytes data) external payable;
    }
}

/// The human-readable ABI of the transparent upgradeable proxy.
///
/// The proxy's only public entrypoint is its constructor; everything else is delegated.
pub const TRANSPARENT_PROXY_ABI: [&str; 1] =
    ["constructor(address _logic, address initialOwner, bytes _data) payable"];
