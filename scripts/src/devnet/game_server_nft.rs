//! Simulated code of the role-managed server NFT logic contract.
//!
//! Runs behind a proxy; the logic contract's own storage is locked at construction
//! so that it can never be initialized directly.

use alloy_primitives::{keccak256, Address, FixedBytes, B256, U256};
use alloy_sol_types::{SolCall, SolInterface};

use super::{
    chain::{CallContext, ContractCode, Revert},
    storage::{
        address_word, bool_word, mapping_slot, slot, u256_word, word_address, word_bool, word_u256,
    },
};
use crate::solidity::{
    IBlackOrWhiteList::isBlacklistedCall,
    IGameServerNFT::{self, IGameServerNFTCalls as Calls},
};

/// Storage labels
const INITIALIZED: &str = "GameServerNFT.initialized";
const ROLES: &str = "GameServerNFT.roles";
const BLACKLIST: &str = "GameServerNFT.blacklist";
const NEXT_TOKEN_ID: &str = "GameServerNFT.nextTokenId";
const OWNERS: &str = "GameServerNFT.owners";
const BALANCES: &str = "GameServerNFT.balances";
const APPROVALS: &str = "GameServerNFT.approvals";
const TOKEN_URIS: &str = "GameServerNFT.tokenURIs";
const SERVER_IDS: &str = "GameServerNFT.serverIds";
const GAME_NAMES: &str = "GameServerNFT.gameNames";
const DEVELOPERS: &str = "GameServerNFT.developers";

/// The interface ids `supportsInterface` reports: ERC-165, ERC-721,
/// ERC-721 metadata, and access control
const SUPPORTED_INTERFACES: [[u8; 4]; 4] = [
    [0x01, 0xff, 0xc9, 0xa7],
    [0x80, 0xac, 0x58, 0xcd],
    [0x5b, 0x5e, 0x13, 0x9f],
    [0x79, 0x65, 0xdb, 0x0b],
];

/// The role allowed to manage admins and hand over super admin
fn super_admin_role() -> B256 {
    keccak256("SUPER_ADMIN_ROLE")
}

/// The role allowed to mint, burn, and update metadata
fn admin_role() -> B256 {
    keccak256("ADMIN_ROLE")
}

/// The role-managed server NFT
pub struct GameServerNft;

impl ContractCode for GameServerNft {
    fn construct(&self, ctx: &mut CallContext<'_>, _args: &[u8]) -> Result<(), Revert> {
        // Initializers are disabled on the logic contract itself
        ctx.sstore(slot(INITIALIZED), bool_word(true))
    }

    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert> {
        let call = Calls::abi_decode(input, true /* validate */)
            .map_err(|_| Revert::new("unrecognized function selector"))?;

        let output = match call {
            Calls::initialize(c) => {
                initialize(ctx, c.superAdmin, c.blacklist)?;
                Vec::new()
            }
            Calls::SUPER_ADMIN_ROLE(_) => {
                IGameServerNFT::SUPER_ADMIN_ROLECall::abi_encode_returns(&(super_admin_role(),))
            }
            Calls::ADMIN_ROLE(_) => {
                IGameServerNFT::ADMIN_ROLECall::abi_encode_returns(&(admin_role(),))
            }
            Calls::hasRole(c) => IGameServerNFT::hasRoleCall::abi_encode_returns(&(has_role(
                ctx, c.role, c.account,
            ),)),
            Calls::isAdmin(c) => {
                IGameServerNFT::isAdminCall::abi_encode_returns(&(is_admin(ctx, c.account),))
            }
            Calls::grantAdminRoles(c) => {
                only_role(ctx, super_admin_role())?;
                for account in c.accounts {
                    if account == Address::ZERO {
                        return Err(Revert::new("cannot grant a role to the zero address"));
                    }
                    set_role(ctx, admin_role(), account, true)?;
                }
                Vec::new()
            }
            Calls::revokeAdminRoles(c) => {
                only_role(ctx, super_admin_role())?;
                for account in c.accounts {
                    set_role(ctx, admin_role(), account, false)?;
                }
                Vec::new()
            }
            Calls::changeSuperAdmin(c) => {
                only_role(ctx, super_admin_role())?;
                if c.newSuperAdmin == Address::ZERO {
                    return Err(Revert::new("new super admin is the zero address"));
                }
                let previous = ctx.sender;
                set_role(ctx, super_admin_role(), c.newSuperAdmin, true)?;
                set_role(ctx, super_admin_role(), previous, false)?;
                Vec::new()
            }
            Calls::blacklist(_) => IGameServerNFT::blacklistCall::abi_encode_returns(&(
                word_address(ctx.sload(slot(BLACKLIST))),
            )),
            Calls::mintServerNFT(c) => {
                only_admin(ctx)?;
                let token_id = mint(
                    ctx,
                    c.to,
                    ServerInfo {
                        server_id: c.serverId,
                        game_name: c.gameName,
                        developer: c.developer,
                        metadata_uri: c.metadataURI,
                    },
                )?;
                IGameServerNFT::mintServerNFTCall::abi_encode_returns(&(token_id,))
            }
            Calls::batchMintServerNFT(c) => {
                only_admin(ctx)?;
                let n = c.recipients.len();
                if [c.serverIds.len(), c.gameNames.len(), c.developers.len(), c.metadataURIs.len()]
                    .iter()
                    .any(|len| *len != n)
                {
                    return Err(Revert::new("batch mint arrays differ in length"));
                }

                let infos = c
                    .serverIds
                    .into_iter()
                    .zip(c.gameNames)
                    .zip(c.developers)
                    .zip(c.metadataURIs)
                    .map(|(((server_id, game_name), developer), metadata_uri)| ServerInfo {
                        server_id,
                        game_name,
                        developer,
                        metadata_uri,
                    });
                for (to, info) in c.recipients.into_iter().zip(infos) {
                    mint(ctx, to, info)?;
                }
                Vec::new()
            }
            Calls::burnServerNFT(c) => {
                only_admin(ctx)?;
                burn(ctx, c.tokenId)?;
                Vec::new()
            }
            Calls::setTokenURI(c) => {
                only_admin(ctx)?;
                owner_of(ctx, c.tokenId)?;
                store_string(ctx, TOKEN_URIS, c.tokenId, c.uri)?;
                Vec::new()
            }
            Calls::nextTokenId(_) => IGameServerNFT::nextTokenIdCall::abi_encode_returns(&(
                word_u256(ctx.sload(slot(NEXT_TOKEN_ID))),
            )),
            Calls::tokenURI(c) => {
                owner_of(ctx, c.tokenId)?;
                IGameServerNFT::tokenURICall::abi_encode_returns(&(load_string(
                    ctx,
                    TOKEN_URIS,
                    c.tokenId,
                ),))
            }
            Calls::getServerInfo(c) => IGameServerNFT::getServerInfoCall::abi_encode_returns(&(
                load_string(ctx, SERVER_IDS, c.tokenId),
                load_string(ctx, GAME_NAMES, c.tokenId),
                load_string(ctx, DEVELOPERS, c.tokenId),
            )),
            Calls::ownerOf(c) => {
                IGameServerNFT::ownerOfCall::abi_encode_returns(&(owner_of(ctx, c.tokenId)?,))
            }
            Calls::balanceOf(c) => {
                if c.owner == Address::ZERO {
                    return Err(Revert::new("balance query for the zero address"));
                }
                IGameServerNFT::balanceOfCall::abi_encode_returns(&(balance_of(ctx, c.owner),))
            }
            Calls::balanceOfAll(c) => {
                IGameServerNFT::balanceOfAllCall::abi_encode_returns(&(tokens_of(ctx, c.owner),))
            }
            Calls::approve(c) => {
                let owner = owner_of(ctx, c.tokenId)?;
                if ctx.sender != owner {
                    return Err(Revert::new("approve caller is not the token owner"));
                }
                if c.to == owner {
                    return Err(Revert::new("approval to the current owner"));
                }
                ctx.sstore(token_slot(APPROVALS, c.tokenId), address_word(c.to))?;
                Vec::new()
            }
            Calls::getApproved(c) => {
                owner_of(ctx, c.tokenId)?;
                IGameServerNFT::getApprovedCall::abi_encode_returns(&(word_address(
                    ctx.sload(token_slot(APPROVALS, c.tokenId)),
                ),))
            }
            Calls::transferFrom(c) => {
                transfer(ctx, c.from, c.to, c.tokenId)?;
                Vec::new()
            }
            Calls::safeTransferFrom(c) => {
                transfer(ctx, c.from, c.to, c.tokenId)?;
                // Simulated contracts never implement the receiver hook
                if ctx.code_at(c.to).is_some() {
                    return Err(Revert::new("transfer to non ERC721Receiver implementer"));
                }
                Vec::new()
            }
            Calls::supportsInterface(c) => {
                let supported =
                    SUPPORTED_INTERFACES.iter().any(|id| FixedBytes(*id) == c.interfaceId);
                IGameServerNFT::supportsInterfaceCall::abi_encode_returns(&(supported,))
            }
        };

        Ok(output)
    }
}

/// The descriptive fields of a minted server token
struct ServerInfo {
    server_id: String,
    game_name: String,
    developer: String,
    metadata_uri: String,
}

/// Run the one-time initializer
fn initialize(
    ctx: &mut CallContext<'_>,
    super_admin: Address,
    blacklist: Address,
) -> Result<(), Revert> {
    if word_bool(ctx.sload(slot(INITIALIZED))) {
        return Err(Revert::new("contract is already initialized"));
    }
    if super_admin == Address::ZERO {
        return Err(Revert::new("super admin is the zero address"));
    }

    ctx.sstore(slot(INITIALIZED), bool_word(true))?;
    ctx.sstore(slot(BLACKLIST), address_word(blacklist))?;
    ctx.sstore(slot(NEXT_TOKEN_ID), u256_word(U256::from(1u64)))?;
    set_role(ctx, super_admin_role(), super_admin, true)?;
    set_role(ctx, admin_role(), super_admin, true)
}

// -----------
// | Helpers |
// -----------

/// The slot of `account`'s membership in `role`
fn role_slot(role: B256, account: Address) -> B256 {
    mapping_slot(mapping_slot(slot(ROLES), role), address_word(account))
}

/// The slot of a per-token value in the mapping labelled `label`
fn token_slot(label: &str, token_id: U256) -> B256 {
    mapping_slot(slot(label), u256_word(token_id))
}

fn has_role(ctx: &CallContext<'_>, role: B256, account: Address) -> bool {
    word_bool(ctx.sload(role_slot(role, account)))
}

fn set_role(
    ctx: &mut CallContext<'_>,
    role: B256,
    account: Address,
    member: bool,
) -> Result<(), Revert> {
    ctx.sstore(role_slot(role, account), bool_word(member))
}

/// Whether `account` holds the admin or super admin role
fn is_admin(ctx: &CallContext<'_>, account: Address) -> bool {
    has_role(ctx, admin_role(), account) || has_role(ctx, super_admin_role(), account)
}

fn only_role(ctx: &CallContext<'_>, role: B256) -> Result<(), Revert> {
    if !has_role(ctx, role, ctx.sender) {
        return Err(Revert::new(format!("account {:#x} is missing role {}", ctx.sender, role)));
    }
    Ok(())
}

fn only_admin(ctx: &CallContext<'_>) -> Result<(), Revert> {
    if !is_admin(ctx, ctx.sender) {
        return Err(Revert::new(format!("account {:#x} is not an admin", ctx.sender)));
    }
    Ok(())
}

/// Fail if the configured blacklist lists `account`
fn check_not_blacklisted(ctx: &mut CallContext<'_>, account: Address) -> Result<(), Revert> {
    let blacklist = word_address(ctx.sload(slot(BLACKLIST)));
    if blacklist == Address::ZERO {
        return Ok(());
    }

    let output = ctx.call(blacklist, &isBlacklistedCall { account }.abi_encode())?;
    let listed = isBlacklistedCall::abi_decode_returns(&output, true /* validate */)
        .map_err(|e| Revert::new(format!("bad blacklist response: {}", e)))?
        ._0;
    if listed {
        return Err(Revert::new(format!("account {:#x} is blacklisted", account)));
    }
    Ok(())
}

fn load_string(ctx: &CallContext<'_>, label: &str, token_id: U256) -> String {
    String::from_utf8_lossy(&ctx.load_bytes(token_slot(label, token_id))).into_owned()
}

fn store_string(
    ctx: &mut CallContext<'_>,
    label: &str,
    token_id: U256,
    value: String,
) -> Result<(), Revert> {
    ctx.store_bytes(token_slot(label, token_id), value.into_bytes())
}

/// The owner of an existing token
fn owner_of(ctx: &CallContext<'_>, token_id: U256) -> Result<Address, Revert> {
    match word_address(ctx.sload(token_slot(OWNERS, token_id))) {
        Address::ZERO => Err(Revert::new(format!("nonexistent token {}", token_id))),
        owner => Ok(owner),
    }
}

fn balance_of(ctx: &CallContext<'_>, owner: Address) -> U256 {
    word_u256(ctx.sload(mapping_slot(slot(BALANCES), address_word(owner))))
}

fn add_balance(ctx: &mut CallContext<'_>, owner: Address, delta: i8) -> Result<(), Revert> {
    let balance = balance_of(ctx, owner);
    let updated = if delta >= 0 {
        balance + U256::from(delta as u8)
    } else {
        balance.saturating_sub(U256::from(delta.unsigned_abs()))
    };
    ctx.sstore(mapping_slot(slot(BALANCES), address_word(owner)), u256_word(updated))
}

/// The ids of every token `owner` holds, ascending
fn tokens_of(ctx: &CallContext<'_>, owner: Address) -> Vec<U256> {
    let next = word_u256(ctx.sload(slot(NEXT_TOKEN_ID)));
    let mut tokens = Vec::new();
    let mut token_id = U256::from(1u64);
    while token_id < next {
        let token_owner = word_address(ctx.sload(token_slot(OWNERS, token_id)));
        if owner != Address::ZERO && token_owner == owner {
            tokens.push(token_id);
        }
        token_id += U256::from(1u64);
    }
    tokens
}

/// Mint the next token to `to`, returning its id
fn mint(ctx: &mut CallContext<'_>, to: Address, info: ServerInfo) -> Result<U256, Revert> {
    if to == Address::ZERO {
        return Err(Revert::new("mint to the zero address"));
    }
    check_not_blacklisted(ctx, to)?;

    let token_id = word_u256(ctx.sload(slot(NEXT_TOKEN_ID)));
    ctx.sstore(token_slot(OWNERS, token_id), address_word(to))?;
    add_balance(ctx, to, 1)?;
    store_string(ctx, SERVER_IDS, token_id, info.server_id)?;
    store_string(ctx, GAME_NAMES, token_id, info.game_name)?;
    store_string(ctx, DEVELOPERS, token_id, info.developer)?;
    store_string(ctx, TOKEN_URIS, token_id, info.metadata_uri)?;
    ctx.sstore(slot(NEXT_TOKEN_ID), u256_word(token_id + U256::from(1u64)))?;

    Ok(token_id)
}

/// Destroy a token and its server info
fn burn(ctx: &mut CallContext<'_>, token_id: U256) -> Result<(), Revert> {
    let owner = owner_of(ctx, token_id)?;
    ctx.sstore(token_slot(OWNERS, token_id), B256::ZERO)?;
    ctx.sstore(token_slot(APPROVALS, token_id), B256::ZERO)?;
    add_balance(ctx, owner, -1)?;
    for label in [SERVER_IDS, GAME_NAMES, DEVELOPERS, TOKEN_URIS] {
        ctx.store_bytes(token_slot(label, token_id), Vec::new())?;
    }
    Ok(())
}

/// Move a token from `from` to `to` on behalf of the owner or its approved delegate
fn transfer(
    ctx: &mut CallContext<'_>,
    from: Address,
    to: Address,
    token_id: U256,
) -> Result<(), Revert> {
    let owner = owner_of(ctx, token_id)?;
    if owner != from {
        return Err(Revert::new("transfer from an account that does not own the token"));
    }
    if to == Address::ZERO {
        return Err(Revert::new("transfer to the zero address"));
    }

    let approved = word_address(ctx.sload(token_slot(APPROVALS, token_id)));
    if ctx.sender != owner && ctx.sender != approved {
        return Err(Revert::new("caller is neither the owner nor approved"));
    }
    check_not_blacklisted(ctx, from)?;
    check_not_blacklisted(ctx, to)?;

    ctx.sstore(token_slot(APPROVALS, token_id), B256::ZERO)?;
    add_balance(ctx, from, -1)?;
    add_balance(ctx, to, 1)?;
    ctx.sstore(token_slot(OWNERS, token_id), address_word(to))
}
