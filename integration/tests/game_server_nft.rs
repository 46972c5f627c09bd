//! End-to-end tests of the server NFT, deployed by the migration steps and driven
//! through its proxy

use alloy::dyn_abi::DynSolValue;
use alloy_primitives::{Address, B256, U256};
use eyre::Result;
use scripts::{
    constants::{BLACK_OR_WHITE_LIST, PROXY_IMPLEMENTATION_STORAGE_SLOT},
    network::Network,
    utils::address_from_slot,
};
use simulation::{addresses, as_bool, as_uint, first, strings, uint, GameServerMarket};

// ---------
// | Setup |
// ---------

#[test]
fn test_deployment_wiring() -> Result<()> {
    let mut market = GameServerMarket::new()?;

    // The initializer bootstrapped the super admin, the execution phase the operator
    assert!(market.is_super_admin(market.base_admin)?);
    assert!(market.is_admin(market.base_admin)?);
    assert!(market.is_admin(market.operator)?);
    assert!(!market.is_admin(market.non_admin)?);

    let blacklist = market.contract(BLACK_OR_WHITE_LIST)?.address;
    let configured = first(market.proxy_call("blacklist", &[])?)?.as_address();
    assert_eq!(configured, blacklist);

    // The proxy points at the logic, and its admin contract is owned by the proxy admin
    let proxy = market.proxy()?.address.unwrap_or_default();
    let implementation =
        address_from_slot(market.net.storage_at(proxy, PROXY_IMPLEMENTATION_STORAGE_SLOT)?);
    assert_eq!(Some(implementation), market.logic()?.address);

    let admin = market.proxy_admin_contract()?;
    let owner = first(market.net.execute_contract(&admin, "owner", U256::ZERO, true, &[])?)?;
    assert_eq!(owner.as_address(), Some(market.proxy_admin));

    Ok(())
}

// ---------------
// | Admin roles |
// ---------------

#[test]
fn test_grant_admin_role() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, non_admin) = (market.base_admin, market.non_admin);

    market.proxy_execute(base_admin, "grantAdminRoles", &[addresses(&[non_admin])])?;
    assert!(market.is_admin(non_admin)?);
    Ok(())
}

#[test]
fn test_revoke_admin_role() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, non_admin) = (market.base_admin, market.non_admin);

    market.proxy_execute(base_admin, "grantAdminRoles", &[addresses(&[non_admin])])?;
    market.proxy_execute(base_admin, "revokeAdminRoles", &[addresses(&[non_admin])])?;
    assert!(!market.is_admin(non_admin)?);
    Ok(())
}

#[test]
fn test_change_super_admin() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, non_admin) = (market.base_admin, market.non_admin);
    assert!(market.is_super_admin(base_admin)?);

    market.proxy_execute(base_admin, "changeSuperAdmin", &[DynSolValue::Address(non_admin)])?;
    assert!(market.is_super_admin(non_admin)?);
    assert!(!market.is_super_admin(base_admin)?);

    // The previous super admin keeps its admin role
    assert!(market.is_admin(base_admin)?);
    market.mint(base_admin, non_admin, "Server_1", "TestGame", "WEMADE", "uri")?;
    Ok(())
}

#[test]
fn test_non_admin_calls_revert() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, operator, non_admin) = (market.base_admin, market.operator, market.non_admin);

    assert!(market.mint(non_admin, non_admin, "Server_1", "TestGame", "WEMADE", "uri").is_err());
    assert!(market
        .proxy_execute(non_admin, "grantAdminRoles", &[addresses(&[non_admin])])
        .is_err());

    // Admins may not manage roles, only the super admin may
    assert!(market
        .proxy_execute(operator, "grantAdminRoles", &[addresses(&[non_admin])])
        .is_err());
    assert!(market
        .proxy_execute(operator, "changeSuperAdmin", &[DynSolValue::Address(operator)])
        .is_err());

    let token_id = market.mint(base_admin, non_admin, "Server_1", "TestGame", "WEMADE", "uri")?;
    assert!(market.proxy_execute(non_admin, "burnServerNFT", &[uint(token_id)]).is_err());
    assert!(market
        .proxy_execute(
            non_admin,
            "setTokenURI",
            &[uint(token_id), DynSolValue::String("hijacked".to_string())]
        )
        .is_err());
    assert_eq!(market.token_uri(token_id)?, "uri");

    Ok(())
}

// -----------
// | Minting |
// -----------

#[test]
fn test_mint_and_token_uri() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, non_admin2) = (market.base_admin, market.non_admin2);

    let token_id = market.mint(
        base_admin,
        non_admin2,
        "Server_test_123",
        "TestGame",
        "WEMADE",
        "metadataURI",
    )?;
    assert_eq!(token_id, U256::from(1u64));
    assert_eq!(market.token_uri(token_id)?, "metadataURI");
    assert_eq!(market.owner_of(token_id)?, non_admin2);
    Ok(())
}

#[test]
fn test_batch_mint() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, non_admin, non_admin2) =
        (market.base_admin, market.non_admin, market.non_admin2);

    let args = [
        addresses(&[non_admin, non_admin2]),
        strings(&["Server_123", "Server_456"]),
        strings(&["NightCrows", "NCGame"]),
        strings(&["WEMADE", "NCSOFT"]),
        strings(&["ipfs://metadata1", "ipfs://metadata2"]),
    ];
    market.proxy_execute(base_admin, "batchMintServerNFT", &args)?;

    let next_token_id = market.next_token_id()?;
    assert_eq!(next_token_id, U256::from(3u64));
    let first_id = next_token_id - U256::from(2u64);
    let second_id = next_token_id - U256::from(1u64);
    assert_eq!(market.token_uri(first_id)?, "ipfs://metadata1");
    assert_eq!(market.token_uri(second_id)?, "ipfs://metadata2");
    assert_eq!(market.owner_of(first_id)?, non_admin);
    assert_eq!(market.owner_of(second_id)?, non_admin2);
    Ok(())
}

#[test]
fn test_batch_mint_length_mismatch_reverts() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, non_admin) = (market.base_admin, market.non_admin);

    let args = [
        addresses(&[non_admin]),
        strings(&["Server_123", "Server_456"]),
        strings(&["NightCrows"]),
        strings(&["WEMADE"]),
        strings(&["ipfs://metadata1"]),
    ];
    assert!(market.proxy_execute(base_admin, "batchMintServerNFT", &args).is_err());
    assert_eq!(market.next_token_id()?, U256::from(1u64));
    Ok(())
}

#[test]
fn test_balance_of_all() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let base_admin = market.base_admin;

    market.mint(base_admin, base_admin, "Server_test_123", "TestGame", "WEMADE", "metadataURI")?;
    market.mint(base_admin, base_admin, "serverID_2", "FunGame2", "WEMADE2", "ipfs://metadata2")?;

    let tokens = first(market.proxy_call("balanceOfAll", &[DynSolValue::Address(base_admin)])?)?;
    let tokens: Vec<_> = tokens
        .as_array()
        .unwrap_or_default()
        .iter()
        .filter_map(|token| token.as_uint().map(|(id, _)| id))
        .collect();
    assert_eq!(tokens, vec![U256::from(1u64), U256::from(2u64)]);

    let balance = as_uint(market.proxy_call("balanceOf", &[DynSolValue::Address(base_admin)])?)?;
    assert_eq!(balance, U256::from(2u64));
    Ok(())
}

// -------------------
// | Token lifecycle |
// -------------------

#[test]
fn test_transfer_with_delegated_approval() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, owner, delegate, recipient) =
        (market.base_admin, market.non_admin, market.non_admin2, market.non_admin3);

    let token_id =
        market.mint(base_admin, owner, "Server_test_123", "NightCrows", "WEMADE", "metadataURI")?;

    // Only the owner may approve
    let approve = [DynSolValue::Address(delegate), uint(token_id)];
    assert!(market.proxy_execute(delegate, "approve", &approve).is_err());
    market.proxy_execute(owner, "approve", &approve)?;

    let transfer =
        [DynSolValue::Address(owner), DynSolValue::Address(recipient), uint(token_id)];
    market.proxy_execute(delegate, "safeTransferFrom", &transfer)?;
    assert_eq!(market.owner_of(token_id)?, recipient);

    // The approval is consumed by the transfer
    let approved = first(market.proxy_call("getApproved", &[uint(token_id)])?)?;
    assert_eq!(approved.as_address(), Some(Address::ZERO));
    let back = [DynSolValue::Address(recipient), DynSolValue::Address(owner), uint(token_id)];
    assert!(market.proxy_execute(delegate, "transferFrom", &back).is_err());

    Ok(())
}

#[test]
fn test_update_metadata_uri() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, non_admin) = (market.base_admin, market.non_admin);

    let initial_uri = "https://mystorageaccount.blob.core.windows.net/wemade/meta.json";
    let token_id =
        market.mint(base_admin, non_admin, "Server_test_123", "TestGame", "WEMADE", initial_uri)?;
    assert_eq!(market.token_uri(token_id)?, initial_uri);

    let new_uri = "new-updated-metadata-uri";
    market.proxy_execute(
        base_admin,
        "setTokenURI",
        &[uint(token_id), DynSolValue::String(new_uri.to_string())],
    )?;
    assert_eq!(market.token_uri(token_id)?, new_uri);
    Ok(())
}

#[test]
fn test_burn() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let base_admin = market.base_admin;

    let token_id = market.mint(
        base_admin,
        base_admin,
        "serverID_123",
        "gameName",
        "WEMADE",
        "ipfs://metadata",
    )?;
    assert_eq!(market.server_id(token_id)?, "serverID_123");

    market.proxy_execute(base_admin, "burnServerNFT", &[uint(token_id)])?;
    assert_eq!(market.server_id(token_id)?, "");
    assert!(market.owner_of(token_id).is_err());
    assert!(market.token_uri(token_id).is_err());
    Ok(())
}

#[test]
fn test_blacklisted_accounts_cannot_receive() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, non_admin, listed) = (market.base_admin, market.non_admin, market.non_admin3);

    // The deployer owns the blacklist
    let blacklist = market.contract(BLACK_OR_WHITE_LIST)?;
    let args = [DynSolValue::Address(listed), DynSolValue::Bool(true)];
    market.net.execute_contract(&blacklist, "setBlacklisted", U256::ZERO, false, &args)?;

    assert!(market.mint(base_admin, listed, "Server_1", "TestGame", "WEMADE", "uri").is_err());

    let token_id = market.mint(base_admin, non_admin, "Server_2", "TestGame", "WEMADE", "uri")?;
    let transfer = [DynSolValue::Address(non_admin), DynSolValue::Address(listed), uint(token_id)];
    assert!(market.proxy_execute(non_admin, "transferFrom", &transfer).is_err());
    assert_eq!(market.owner_of(token_id)?, non_admin);
    Ok(())
}

#[test]
fn test_supports_erc721_interface() -> Result<()> {
    let mut market = GameServerMarket::new()?;

    let erc721 = DynSolValue::FixedBytes(B256::right_padding_from(&[0x80, 0xac, 0x58, 0xcd]), 4);
    assert!(as_bool(market.proxy_call("supportsInterface", &[erc721])?)?);

    let invalid = DynSolValue::FixedBytes(B256::right_padding_from(&[0xff, 0xff, 0xff, 0xff]), 4);
    assert!(!as_bool(market.proxy_call("supportsInterface", &[invalid])?)?);
    Ok(())
}

// ------------------
// | Proxy protocol |
// ------------------

#[test]
fn test_initializer_cannot_run_twice() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, non_admin) = (market.base_admin, market.non_admin);
    let args = [DynSolValue::Address(non_admin), DynSolValue::Address(Address::ZERO)];

    // Through the proxy, where it already ran
    assert!(market.proxy_execute(base_admin, "initialize", &args).is_err());
    assert!(!market.is_super_admin(non_admin)?);

    // Directly on the logic, where initializers are disabled
    let logic = market.logic()?;
    assert!(market
        .net
        .execute_from(non_admin, &logic, "initialize", U256::ZERO, false, &args)
        .is_err());
    Ok(())
}

#[test]
fn test_logic_storage_unaffected_by_proxy_calls() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, operator, non_admin) = (market.base_admin, market.operator, market.non_admin);

    market.proxy_execute(base_admin, "grantAdminRoles", &[addresses(&[non_admin])])?;
    market.mint(base_admin, non_admin, "Server_1", "TestGame", "WEMADE", "uri")?;

    assert!(market.is_admin(operator)?);
    assert!(market.is_admin(non_admin)?);
    assert!(!as_bool(market.logic_call("isAdmin", &[DynSolValue::Address(operator)])?)?);
    assert!(!as_bool(market.logic_call("isAdmin", &[DynSolValue::Address(non_admin)])?)?);
    assert_eq!(as_uint(market.logic_call("nextTokenId", &[])?)?, U256::ZERO);
    Ok(())
}

#[test]
fn test_upgrade_keeps_proxy_state() -> Result<()> {
    let mut market = GameServerMarket::new()?;
    let (base_admin, operator, non_admin) = (market.base_admin, market.operator, market.non_admin);
    let token_id = market.mint(base_admin, non_admin, "Server_1", "TestGame", "WEMADE", "uri")?;

    // A second deployment of the logic
    let logic = market.logic()?;
    let receipt = market.net.deploy(&logic, U256::ZERO, &[])?;
    let new_logic = receipt.deployed_address.unwrap();

    let proxy = market.proxy()?.address.unwrap_or_default();
    let admin = market.proxy_admin_contract()?;
    let upgrade = [
        DynSolValue::Address(proxy),
        DynSolValue::Address(new_logic),
        DynSolValue::Bytes(Vec::new()),
    ];

    // Only the admin contract's owner may upgrade
    assert!(market
        .net
        .execute_from(base_admin, &admin, "upgradeAndCall", U256::ZERO, false, &upgrade)
        .is_err());
    let owner = market.proxy_admin;
    market.net.execute_from(owner, &admin, "upgradeAndCall", U256::ZERO, false, &upgrade)?;

    let implementation =
        address_from_slot(market.net.storage_at(proxy, PROXY_IMPLEMENTATION_STORAGE_SLOT)?);
    assert_eq!(implementation, new_logic);

    assert_eq!(market.owner_of(token_id)?, non_admin);
    assert_eq!(market.token_uri(token_id)?, "uri");
    assert!(market.is_admin(operator)?);
    assert!(market.is_super_admin(base_admin)?);
    Ok(())
}
