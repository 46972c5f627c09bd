//! An ephemeral development chain with simulated contract code, for exercising
//! deployments end-to-end without a node or compiled artifacts

mod blacklist;
mod chain;
mod game_server_nft;
mod proxy;
pub mod storage;

use std::{collections::HashMap, sync::Arc};

use alloy::json_abi::JsonAbi;
use alloy_primitives::keccak256;
pub use chain::{CallContext, ContractCode, EphemeralChain, Revert, TxOutcome, TxRecord};

use crate::{
    artifacts::ContractArtifact,
    constants::{BLACK_OR_WHITE_LIST, GAME_SERVER_NFT, GAME_SERVER_NFT_PROXY, PROXY_ADMIN},
    errors::ScriptError,
    solidity::{IBlackOrWhiteList, IGameServerNFT, IProxyAdmin, TRANSPARENT_PROXY_ABI},
};

/// Simulated contract code, keyed by the artifact name it stands in for
#[derive(Clone)]
pub struct CodeBook {
    /// Artifact name to code
    codes: HashMap<String, Arc<dyn ContractCode>>,
}

impl CodeBook {
    /// A code book with no entries
    pub fn empty() -> Self {
        Self { codes: HashMap::new() }
    }

    /// The code of every contract the project deploys or depends on
    pub fn standard() -> Self {
        let mut book = Self::empty();
        book.register(BLACK_OR_WHITE_LIST, Arc::new(blacklist::BlackOrWhiteList));
        book.register(GAME_SERVER_NFT, Arc::new(game_server_nft::GameServerNft));
        book.register(GAME_SERVER_NFT_PROXY, Arc::new(proxy::TransparentProxy));
        book.register(PROXY_ADMIN, Arc::new(proxy::ProxyAdmin));
        book
    }

    /// Register the code deployed for artifacts named `name`
    pub fn register(&mut self, name: &str, code: Arc<dyn ContractCode>) {
        self.codes.insert(name.to_string(), code);
    }

    /// The code for artifacts named `name`
    pub fn get(&self, name: &str) -> Option<Arc<dyn ContractCode>> {
        self.codes.get(name).cloned()
    }
}

impl Default for CodeBook {
    fn default() -> Self {
        Self::standard()
    }
}

/// Artifacts for every contract in the standard code book.
///
/// The ABIs are the ones the simulated code implements; the bytecode is a
/// placeholder unique to each name, since the chain runs code by artifact name.
pub fn simulated_artifacts() -> Result<Vec<ContractArtifact>, ScriptError> {
    let proxy_abi = JsonAbi::parse(TRANSPARENT_PROXY_ABI)
        .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;

    let abis = [
        (BLACK_OR_WHITE_LIST, IBlackOrWhiteList::abi::contract()),
        (GAME_SERVER_NFT, IGameServerNFT::abi::contract()),
        (GAME_SERVER_NFT_PROXY, proxy_abi),
        (PROXY_ADMIN, IProxyAdmin::abi::contract()),
    ];

    Ok(abis
        .into_iter()
        .map(|(name, abi)| {
            let bytecode = keccak256(name.as_bytes()).to_vec();
            ContractArtifact::new(name, abi, bytecode.into())
        })
        .collect())
}
