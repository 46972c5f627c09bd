//! Simulated code of the transparent upgradeable proxy and the admin contract it creates

use std::sync::Arc;

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{SolCall, SolInterface, SolValue};

use super::{
    chain::{CallContext, ContractCode, Revert},
    storage::{address_word, slot, word_address},
};
use crate::{
    constants::{PROXY_ADMIN_STORAGE_SLOT, PROXY_IMPLEMENTATION_STORAGE_SLOT},
    solidity::{
        IProxyAdmin::{self, IProxyAdminCalls},
        ITransparentUpgradeableProxy::upgradeToAndCallCall,
    },
};

/// The proxy's constructor arguments: logic, initial admin owner, and initializer calldata
type ConstructorArgs = (Address, Address, Bytes);

/// A transparent proxy.
///
/// Calls from the admin contract may only upgrade the proxy; every other caller
/// is delegated to the implementation, running against the proxy's storage.
pub struct TransparentProxy;

impl ContractCode for TransparentProxy {
    fn construct(&self, ctx: &mut CallContext<'_>, args: &[u8]) -> Result<(), Revert> {
        let (logic, initial_owner, data) =
            ConstructorArgs::abi_decode_params(args, true /* validate */)
                .map_err(|e| Revert::new(format!("bad proxy constructor arguments: {}", e)))?;

        let admin = ctx.create(Arc::new(ProxyAdmin), &initial_owner.abi_encode())?;
        ctx.sstore(PROXY_ADMIN_STORAGE_SLOT, address_word(admin))?;
        upgrade_to_and_call(ctx, logic, &data)
    }

    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert> {
        let admin = word_address(ctx.sload(PROXY_ADMIN_STORAGE_SLOT));
        if ctx.sender == admin {
            let upgrade = upgradeToAndCallCall::abi_decode(input, true /* validate */)
                .map_err(|_| Revert::new("admin cannot fallback to proxy target"))?;
            upgrade_to_and_call(ctx, upgrade.newImplementation, &upgrade.data)?;
            return Ok(Vec::new());
        }

        let implementation = word_address(ctx.sload(PROXY_IMPLEMENTATION_STORAGE_SLOT));
        let code = ctx
            .code_at(implementation)
            .ok_or_else(|| Revert::new("proxy implementation has no code"))?;
        ctx.delegate(&code, input)
    }
}

/// Point the proxy at `implementation`, then delegate `data` to it if non-empty
fn upgrade_to_and_call(
    ctx: &mut CallContext<'_>,
    implementation: Address,
    data: &[u8],
) -> Result<(), Revert> {
    let code = ctx
        .code_at(implementation)
        .ok_or_else(|| Revert::new(format!("invalid implementation {:#x}", implementation)))?;
    ctx.sstore(PROXY_IMPLEMENTATION_STORAGE_SLOT, address_word(implementation))?;

    if !data.is_empty() {
        ctx.delegate(&code, data)?;
    }
    Ok(())
}

const OWNER: &str = "ProxyAdmin.owner";

/// The owned contract allowed to upgrade a proxy
pub struct ProxyAdmin;

impl ContractCode for ProxyAdmin {
    fn construct(&self, ctx: &mut CallContext<'_>, args: &[u8]) -> Result<(), Revert> {
        let owner = Address::abi_decode(args, true /* validate */)
            .map_err(|e| Revert::new(format!("bad proxy admin owner: {}", e)))?;
        if owner == Address::ZERO {
            return Err(Revert::new("proxy admin owner is the zero address"));
        }
        ctx.sstore(slot(OWNER), address_word(owner))
    }

    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert> {
        let call = IProxyAdminCalls::abi_decode(input, true /* validate */)
            .map_err(|_| Revert::new("unrecognized function selector"))?;

        let owner = word_address(ctx.sload(slot(OWNER)));
        match call {
            IProxyAdminCalls::owner(_) => Ok(IProxyAdmin::ownerCall::abi_encode_returns(&(owner,))),
            IProxyAdminCalls::upgradeAndCall(c) => {
                if ctx.sender != owner {
                    return Err(Revert::new(format!("account {:#x} is not the owner", ctx.sender)));
                }
                let upgrade =
                    upgradeToAndCallCall { newImplementation: c.implementation, data: c.data };
                ctx.call(c.proxy, &upgrade.abi_encode())?;
                Ok(Vec::new())
            }
        }
    }
}
