//! Compiled contract artifacts and the ABI helpers built on top of them

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt},
    json_abi::{Function, JsonAbi},
    primitives::{hex, Address, Bytes},
};
use serde::Deserialize;
use serde_json::Value;

use crate::{constants::ARTIFACT_EXTENSION, errors::ScriptError};

/// A compiled contract, and once deployed, its on-chain address
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    /// The name the contract is registered under
    pub name: String,
    /// The contract's ABI
    pub abi: JsonAbi,
    /// The contract's creation bytecode
    pub bytecode: Bytes,
    /// The address the contract was deployed at, if any
    pub address: Option<Address>,
    /// For proxies, the logic contract calls are delegated to
    pub logic: Option<Box<ContractArtifact>>,
}

impl ContractArtifact {
    /// Create an undeployed artifact
    pub fn new(name: impl Into<String>, abi: JsonAbi, bytecode: Bytes) -> Self {
        Self { name: name.into(), abi, bytecode, address: None, logic: None }
    }

    /// The ABI that calls to this contract are encoded against.
    ///
    /// A proxy exposes the interface of its logic contract.
    pub fn call_abi(&self) -> &JsonAbi {
        match &self.logic {
            Some(logic) => &logic.abi,
            None => &self.abi,
        }
    }

    /// ABI-encode a call to `method` with the given arguments, selector included
    pub fn encode_call(&self, method: &str, args: &[DynSolValue]) -> Result<Vec<u8>, ScriptError> {
        let function = self.function(method, args)?;
        function.abi_encode_input(args).map_err(|e| {
            ScriptError::CalldataConstruction(format!("{}.{}: {}", self.name, method, e))
        })
    }

    /// Decode the return data of a call to `method`
    pub fn decode_output(
        &self,
        method: &str,
        args: &[DynSolValue],
        data: &[u8],
    ) -> Result<Vec<DynSolValue>, ScriptError> {
        let function = self.function(method, args)?;
        function.abi_decode_output(data, true /* validate */).map_err(|e| {
            ScriptError::ContractInteraction(format!("{}.{}: {}", self.name, method, e))
        })
    }

    /// The creation code for this contract: bytecode followed by the encoded constructor arguments
    pub fn creation_code(&self, args: &[DynSolValue]) -> Result<Bytes, ScriptError> {
        let mut code = self.bytecode.to_vec();
        match self.abi.constructor() {
            Some(constructor) => {
                let encoded = constructor.abi_encode_input(args).map_err(|e| {
                    ScriptError::CalldataConstruction(format!("{} constructor: {}", self.name, e))
                })?;
                code.extend(encoded);
            }
            None if !args.is_empty() => {
                return Err(ScriptError::CalldataConstruction(format!(
                    "{} has no constructor but {} arguments were given",
                    self.name,
                    args.len()
                )));
            }
            None => {}
        }

        Ok(code.into())
    }

    /// Find the overload of `method` whose inputs accept `args`
    fn function(&self, method: &str, args: &[DynSolValue]) -> Result<&Function, ScriptError> {
        let overloads = self.call_abi().function(method).ok_or_else(|| {
            ScriptError::CalldataConstruction(format!("{} has no method `{}`", self.name, method))
        })?;

        overloads
            .iter()
            .find(|f| f.inputs.len() == args.len() && f.abi_encode_input(args).is_ok())
            .ok_or_else(|| {
                ScriptError::CalldataConstruction(format!(
                    "no overload of {}.{} accepts the given {} arguments",
                    self.name,
                    method,
                    args.len()
                ))
            })
    }
}

/// The bytecode field of a compiled artifact, either a bare hex string (solc)
/// or an object holding one (forge)
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    /// A bare hex string
    Hex(String),
    /// A forge-style bytecode object
    Object {
        /// The hex encoded bytecode
        object: String,
    },
}

/// The subset of a compiled artifact read by the scripts
#[derive(Deserialize)]
struct RawArtifact {
    /// The contract ABI
    abi: JsonAbi,
    /// The contract creation bytecode
    bytecode: RawBytecode,
}

/// Load the compiled artifacts under `dir`.
///
/// Returns the artifacts keyed by name, along with the same artifacts ordered by path.
/// Artifacts without bytecode (interfaces, abstract contracts) are skipped.
pub fn load_artifacts(
    dir: &Path,
) -> Result<(HashMap<String, ContractArtifact>, Vec<ContractArtifact>), ScriptError> {
    let mut paths = Vec::new();
    collect_artifact_paths(dir, &mut paths)?;
    paths.sort();

    let mut by_name = HashMap::new();
    let mut ordered = Vec::new();
    for path in paths {
        let Some(artifact) = parse_artifact(&path)? else {
            continue;
        };

        if by_name.contains_key(&artifact.name) {
            return Err(ScriptError::ArtifactParsing(format!(
                "duplicate contract name `{}` at {}",
                artifact.name,
                path.display()
            )));
        }

        by_name.insert(artifact.name.clone(), artifact.clone());
        ordered.push(artifact);
    }

    Ok((by_name, ordered))
}

/// Recursively collect the JSON files under `dir`
fn collect_artifact_paths(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), ScriptError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ScriptError::ReadFile(format!("{}: {}", dir.display(), e)))?;

    for entry in entries {
        let path = entry.map_err(|e| ScriptError::ReadFile(e.to_string()))?.path();
        if path.is_dir() {
            collect_artifact_paths(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION) {
            paths.push(path);
        }
    }

    Ok(())
}

/// Parse a single artifact file, returning `None` for JSON files that are
/// not deployable contract artifacts
fn parse_artifact(path: &Path) -> Result<Option<ContractArtifact>, ScriptError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ScriptError::ReadFile(format!("{}: {}", path.display(), e)))?;
    let json: Value = serde_json::from_str(&contents)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e)))?;
    if json.get("abi").is_none() || json.get("bytecode").is_none() {
        return Ok(None);
    }

    let raw: RawArtifact = serde_json::from_value(json)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e)))?;
    let hex_code = match &raw.bytecode {
        RawBytecode::Hex(s) => s,
        RawBytecode::Object { object } => object,
    };
    let bytecode = hex::decode(hex_code)
        .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e)))?;
    if bytecode.is_empty() {
        return Ok(None);
    }

    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| ScriptError::ArtifactParsing(format!("bad file name {}", path.display())))?;

    Ok(Some(ContractArtifact::new(name, raw.abi, bytecode.into())))
}
