//! The run-scoped contract registry, and the deployments record that persists it across runs

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fs,
    path::Path,
};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{artifacts::ContractArtifact, errors::ScriptError};

/// Maps contract names to their compiled artifacts and, once deployed, their addresses
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    /// The artifacts, keyed by name
    artifacts: HashMap<String, ContractArtifact>,
    /// Artifact names in load order
    order: Vec<String>,
    /// Deployed contracts whose post-deployment configuration completed
    configured: HashSet<String>,
}

impl ContractRegistry {
    /// Build a registry from artifacts in load order
    pub fn new(artifacts: impl IntoIterator<Item = ContractArtifact>) -> Self {
        let mut registry = Self::default();
        for artifact in artifacts {
            registry.insert(artifact);
        }
        registry
    }

    /// Add an artifact, replacing any artifact with the same name
    pub fn insert(&mut self, artifact: ContractArtifact) {
        if !self.artifacts.contains_key(&artifact.name) {
            self.order.push(artifact.name.clone());
        }
        self.artifacts.insert(artifact.name.clone(), artifact);
    }

    /// The artifact registered under `name`
    pub fn get(&self, name: &str) -> Option<&ContractArtifact> {
        self.artifacts.get(name)
    }

    /// The address `name` is deployed at, if it is deployed
    pub fn address(&self, name: &str) -> Option<Address> {
        self.get(name).and_then(|artifact| artifact.address)
    }

    /// Whether `name` is registered with an address
    pub fn is_deployed(&self, name: &str) -> bool {
        self.address(name).is_some()
    }

    /// Whether `name` is deployed and its post-deployment configuration completed
    pub fn is_configured(&self, name: &str) -> bool {
        self.is_deployed(name) && self.configured.contains(name)
    }

    /// Mark the deployed contract `name` as configured
    pub fn mark_configured(&mut self, name: &str) {
        self.configured.insert(name.to_string());
    }

    /// The number of registered artifacts
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the registry holds no artifacts
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The artifacts in load order
    pub fn iter(&self) -> impl Iterator<Item = &ContractArtifact> {
        self.order.iter().filter_map(|name| self.artifacts.get(name))
    }

    /// Record that `deployed` now lives at `address`.
    ///
    /// The registry entry takes the deployed artifact as-is, including the logic
    /// reference a proxy step attached to it. A fresh deployment is not configured.
    pub fn record_deployment(
        &mut self,
        mut deployed: ContractArtifact,
        address: Address,
    ) -> Result<(), ScriptError> {
        if !self.artifacts.contains_key(&deployed.name) {
            return Err(ScriptError::Unresolved(format!(
                "no artifact named `{}` in the registry",
                deployed.name
            )));
        }

        deployed.address = Some(address);
        self.configured.remove(&deployed.name);
        self.insert(deployed);
        Ok(())
    }

    /// Seed deployed addresses from a previous run's record.
    ///
    /// Entries for contracts that are not part of this build are skipped with a warning.
    pub fn seed(&mut self, record: &DeploymentsRecord) {
        for (name, entry) in record.deployments.iter() {
            let Some(artifact) = self.artifacts.get_mut(name) else {
                warn!(contract = %name, "recorded deployment has no compiled artifact, skipping");
                continue;
            };

            artifact.address = Some(entry.address);
            if entry.configured {
                self.configured.insert(name.clone());
            }
        }

        // Logic references are attached once every address is in place
        for (name, entry) in record.deployments.iter() {
            let Some(logic_name) = &entry.logic else { continue };
            let Some(logic) = self.artifacts.get(logic_name).cloned() else {
                warn!(contract = %name, logic = %logic_name, "recorded logic contract is unknown");
                continue;
            };
            if let Some(artifact) = self.artifacts.get_mut(name) {
                artifact.logic = Some(Box::new(logic));
            }
        }
    }

    /// Snapshot the deployed contracts into a record
    pub fn to_record(&self, snapshot: &str) -> DeploymentsRecord {
        let deployments = self
            .iter()
            .filter_map(|artifact| {
                let address = artifact.address?;
                let logic = artifact.logic.as_ref().map(|logic| logic.name.clone());
                let configured = self.configured.contains(&artifact.name);
                Some((artifact.name.clone(), DeploymentEntry { address, logic, configured }))
            })
            .collect();

        DeploymentsRecord { snapshot: snapshot.to_string(), deployments }
    }
}

/// A single deployed contract in the deployments record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentEntry {
    /// The deployed address
    pub address: Address,
    /// The logic contract's name, for proxies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<String>,
    /// Whether the post-deployment configuration completed. A deployed but
    /// unconfigured contract is not redeployed, but is configured again.
    #[serde(default)]
    pub configured: bool,
}

/// The deployments of a chain, as persisted in `deployments.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentsRecord {
    /// The label of the run that wrote the record
    #[serde(default)]
    pub snapshot: String,
    /// Contract name to deployment
    #[serde(default)]
    pub deployments: BTreeMap<String, DeploymentEntry>,
}

impl DeploymentsRecord {
    /// Read the record at `path`, if one exists
    pub fn read(path: &Path) -> Result<Option<Self>, ScriptError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScriptError::ReadFile(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| ScriptError::ReadFile(format!("{}: {}", path.display(), e)))
    }

    /// Write the record to `path`, creating parent directories as needed
    pub fn write(&self, path: &Path) -> Result<(), ScriptError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ScriptError::WriteFile(e.to_string()))?;
        }

        let contents =
            serde_json::to_string_pretty(self).map_err(|e| ScriptError::WriteFile(e.to_string()))?;
        fs::write(path, contents).map_err(|e| ScriptError::WriteFile(e.to_string()))
    }
}
