//! Scripts for deploying and wiring the GameServerNFT contracts: a migration engine
//! running ordered deployment steps against a live node or a local Anvil node.
//!
//! The `devnet` feature adds an in-process chain with simulated contract code, for
//! exercising the engine where neither a node nor compiled artifacts are available.

#![deny(missing_docs)]

pub mod artifacts;
pub mod cli;
pub mod commands;
pub mod config;
pub mod constants;
#[cfg(any(test, feature = "devnet"))]
pub mod devnet;
pub mod errors;
pub mod migration;
pub mod network;
pub mod registry;
#[cfg(any(test, feature = "devnet"))]
mod solidity;
pub mod steps;
#[cfg(test)]
mod test_utils;
pub mod utils;
