//! Definitions of CLI arguments for the migration script

use std::path::PathBuf;

use alloy_primitives::Address;
use clap::Parser;

/// Deploy and wire the GameServerNFT contracts
#[derive(Parser, Debug, Clone)]
pub struct Cli {
    /// Path to the migration config (roles, external addresses, chains)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the deployer's encrypted keystore; the password is read from `KEYSTORE_PASSWORD`
    #[arg(short, long)]
    pub keystore: Option<PathBuf>,

    /// Private key of the deployer, used when no keystore is given
    #[arg(short, long, env = "PKEY")]
    pub priv_key: Option<String>,

    /// Number of signatures required per transaction; only single-signer deployments are supported
    #[arg(long, default_value_t = 1)]
    pub threshold: u32,

    /// Comma-separated contract names to restrict the migration to
    #[arg(short, long, default_value = "")]
    pub filter: String,

    /// The expected deployer address, checked against the signer
    #[arg(long)]
    pub from: Option<Address>,

    /// Directory holding the per-chain deployments records
    #[arg(short, long, default_value = "data")]
    pub datadir: PathBuf,

    /// Directory of compiled contract artifacts
    #[arg(short, long, default_value = "out")]
    pub artifacts: PathBuf,

    /// The chain to deploy to, as named in the config and the data directory
    #[arg(long, default_value = "local")]
    pub chain: String,

    /// RPC url of the node, overriding the chain's configured url
    #[arg(short, long)]
    pub rpc_url: Option<String>,

    /// Label of this run, written to the deployments record
    #[arg(short, long, default_value = "")]
    pub snapshot: String,

    /// Write the deployments record after the run
    #[arg(long)]
    pub record: bool,

    /// Dry-run against a freshly spawned Anvil node instead of the configured chain
    #[arg(long)]
    pub test: bool,

    /// Check that each deployment left runtime code behind
    #[arg(long)]
    pub verify: bool,
}
