//! Simulated code of the shared account blacklist

use alloy_primitives::{Address, B256};
use alloy_sol_types::{SolCall, SolInterface};

use super::{
    chain::{CallContext, ContractCode, Revert},
    storage::{address_word, bool_word, mapping_slot, slot, word_address, word_bool},
};
use crate::solidity::IBlackOrWhiteList::{self, IBlackOrWhiteListCalls as Calls};

const OWNER: &str = "BlackOrWhiteList.owner";
const LISTED: &str = "BlackOrWhiteList.listed";

/// An owner-managed set of blacklisted accounts
pub struct BlackOrWhiteList;

impl ContractCode for BlackOrWhiteList {
    fn construct(&self, ctx: &mut CallContext<'_>, _args: &[u8]) -> Result<(), Revert> {
        let owner = ctx.sender;
        ctx.sstore(slot(OWNER), address_word(owner))
    }

    fn call(&self, ctx: &mut CallContext<'_>, input: &[u8]) -> Result<Vec<u8>, Revert> {
        let call = Calls::abi_decode(input, true /* validate */)
            .map_err(|_| Revert::new("unrecognized function selector"))?;

        let owner = word_address(ctx.sload(slot(OWNER)));
        match call {
            Calls::owner(_) => Ok(IBlackOrWhiteList::ownerCall::abi_encode_returns(&(owner,))),
            Calls::isBlacklisted(c) => {
                let listed = word_bool(ctx.sload(listed_slot(c.account)));
                Ok(IBlackOrWhiteList::isBlacklistedCall::abi_encode_returns(&(listed,)))
            }
            Calls::setBlacklisted(c) => {
                if ctx.sender != owner {
                    return Err(Revert::new("caller is not the owner"));
                }
                ctx.sstore(listed_slot(c.account), bool_word(c.blacklisted))?;
                Ok(Vec::new())
            }
        }
    }
}

fn listed_slot(account: Address) -> B256 {
    mapping_slot(slot(LISTED), address_word(account))
}
