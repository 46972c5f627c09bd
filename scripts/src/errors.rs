//! Definitions of errors that can occur during the execution of the migration scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Errors that can occur during the execution of the migration scripts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// Error reading a file from disk
    ReadFile(String),
    /// Error writing a file to disk
    WriteFile(String),
    /// Error parsing a Solidity compilation artifact
    ArtifactParsing(String),
    /// Error parsing the migration config
    ConfigParsing(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// A contract, role, or address could not be resolved by name
    Unresolved(String),
    /// Error constructing calldata for a contract method
    CalldataConstruction(String),
    /// Error deploying a contract
    ContractDeployment(String),
    /// Error calling a contract method
    ContractInteraction(String),
    /// A post-deployment check did not hold
    Validation(String),
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::ReadFile(s) => write!(f, "error reading file: {}", s),
            ScriptError::WriteFile(s) => write!(f, "error writing file: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::ConfigParsing(s) => write!(f, "error parsing config: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::Unresolved(s) => write!(f, "unresolved: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::ContractDeployment(s) => write!(f, "error deploying contract: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            ScriptError::Validation(s) => write!(f, "validation failed: {}", s),
        }
    }
}

impl Error for ScriptError {}
