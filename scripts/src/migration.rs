//! The migration engine: runs an ordered list of deployment steps against a network,
//! one step and one phase at a time, halting on the first failure.
//!
//! Nothing is rolled back on a halt. Contracts deployed before the failing step stay
//! in the registry, so a later run over the same steps resumes where this one stopped.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use alloy_primitives::{Address, TxHash};
use tracing::{error, info};

use crate::{
    errors::ScriptError,
    network::{Network, Receipt},
    steps::DeploymentStep,
    utils::parse_filter,
};

/// A phase of the deployment step lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Binding the step to its artifact
    Init,
    /// Sending the deployment transaction
    Deployment,
    /// Checking the deployed contract
    Validation,
    /// Sending post-deployment configuration
    Execution,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => write!(f, "init"),
            Phase::Deployment => write!(f, "deployment"),
            Phase::Validation => write!(f, "validation"),
            Phase::Execution => write!(f, "execution"),
        }
    }
}

/// Why a migration did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// There were no steps to run, before or after filtering
    NoSteps(String),
    /// A step depends on a contract that is neither deployed nor deployed earlier in the run
    Dependency {
        /// The target of the dependent step
        step: String,
        /// The missing dependency
        dependency: String,
    },
    /// A step failed in one of its phases
    Step {
        /// The target of the failing step
        step: String,
        /// The phase that failed
        phase: Phase,
        /// The underlying failure
        source: ScriptError,
    },
}

impl MigrationError {
    /// The target of the step the migration halted on, if it halted on a step
    pub fn step(&self) -> Option<&str> {
        match self {
            MigrationError::NoSteps(_) => None,
            MigrationError::Dependency { step, .. } | MigrationError::Step { step, .. } => {
                Some(step)
            }
        }
    }
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MigrationError::NoSteps(s) => write!(f, "nothing to migrate: {}", s),
            MigrationError::Dependency { step, dependency } => {
                write!(f, "`{}` depends on `{}`, which is not deployed", step, dependency)
            }
            MigrationError::Step { step, phase, source } => {
                write!(f, "`{}` failed in {}: {}", step, phase, source)
            }
        }
    }
}

impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MigrationError::Step { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// What happened to a single step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The target was already deployed and configured
    Skipped {
        /// The step's target
        target: String,
    },
    /// The target was deployed by an earlier run that halted before configuring it,
    /// and has now been validated and configured at its recorded address
    Resumed {
        /// The step's target
        target: String,
        /// The recorded address
        address: Address,
    },
    /// The target was deployed and configured
    Deployed {
        /// The step's target
        target: String,
        /// The deployed address
        address: Address,
        /// The deployment transaction
        transaction_hash: TxHash,
    },
}

/// The outcome of a completed migration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// The label of the run
    pub snapshot: String,
    /// The outcome of each step that ran, in order
    pub steps: Vec<StepOutcome>,
}

impl MigrationReport {
    /// The number of contracts deployed by the run
    pub fn num_deployed(&self) -> usize {
        self.steps.iter().filter(|s| matches!(s, StepOutcome::Deployed { .. })).count()
    }
}

/// An ordered set of deployment steps, optionally filtered by contract name
pub struct Migration {
    /// The steps, in execution order
    steps: Vec<Box<dyn DeploymentStep>>,
    /// The contract names to restrict the run to; empty for all
    filter: Vec<String>,
    /// The label of the run
    snapshot: String,
}

impl Migration {
    /// A migration over `steps`, restricted to the comma-separated contract names
    /// in `filter` if it is non-empty
    pub fn new(steps: Vec<Box<dyn DeploymentStep>>, filter: &str, snapshot: &str) -> Self {
        Self { steps, filter: parse_filter(filter), snapshot: snapshot.to_string() }
    }

    /// Run the selected steps in order.
    ///
    /// Before any transaction is sent, checks that there is something to run and
    /// that every step's dependencies are deployed or deployed earlier in the run.
    pub fn run(&mut self, net: &mut dyn Network) -> Result<MigrationReport, MigrationError> {
        if self.steps.is_empty() {
            return Err(MigrationError::NoSteps("the migration has no steps".to_string()));
        }

        let filter = &self.filter;
        let selected: Vec<&mut Box<dyn DeploymentStep>> = self
            .steps
            .iter_mut()
            .filter(|step| filter.is_empty() || filter.iter().any(|name| name == step.target()))
            .collect();
        if selected.is_empty() {
            return Err(MigrationError::NoSteps(format!(
                "no step matches the filter {:?}",
                self.filter
            )));
        }

        validate_dependencies(&selected, net)?;

        let mut report = MigrationReport { snapshot: self.snapshot.clone(), steps: Vec::new() };
        for step in selected {
            match run_step(net, &mut **step) {
                Ok(outcome) => report.steps.push(outcome),
                Err(e) => {
                    error!(step = ?e.step(), error = %e, "migration halted");
                    return Err(e);
                }
            }
        }

        info!(
            snapshot = %self.snapshot,
            num_steps = report.steps.len(),
            num_deployed = report.num_deployed(),
            "migration complete"
        );
        Ok(report)
    }
}

/// Fail unless every dependency of every selected step is either already deployed,
/// or the target of an earlier selected step
fn validate_dependencies(
    selected: &[&mut Box<dyn DeploymentStep>],
    net: &dyn Network,
) -> Result<(), MigrationError> {
    for (i, step) in selected.iter().enumerate() {
        for dependency in step.dependencies() {
            let earlier = selected[..i].iter().any(|s| s.target() == dependency);
            if !earlier && !net.registry().is_deployed(&dependency) {
                return Err(MigrationError::Dependency {
                    step: step.target().to_string(),
                    dependency,
                });
            }
        }
    }

    Ok(())
}

/// Run a single step through its full lifecycle, recording the deployment in
/// the network's registry, and marking it configured once execution succeeds
pub fn run_step(
    net: &mut dyn Network,
    step: &mut dyn DeploymentStep,
) -> Result<StepOutcome, MigrationError> {
    let target = step.target().to_string();
    let fail = |phase: Phase| {
        let step = target.clone();
        move |source: ScriptError| MigrationError::Step { step, phase, source }
    };

    let artifact = net
        .get_contract(&target)
        .cloned()
        .ok_or_else(|| ScriptError::Unresolved(format!("no compiled artifact named `{}`", target)))
        .map_err(fail(Phase::Init))?;
    step.init(artifact);

    if step.loaded(net.registry()) {
        info!(contract = %target, "already deployed, skipping");
        return Ok(StepOutcome::Skipped { target });
    }

    let recorded = step.artifact().and_then(|artifact| artifact.address);
    let outcome = match recorded.filter(|_| step.deployed()) {
        Some(address) => {
            info!(contract = %target, %address, "deployed but not configured, resuming");
            StepOutcome::Resumed { target: target.clone(), address }
        }
        None => {
            info!(contract = %target, "deploying");
            let receipt = step.deployment(net).map_err(fail(Phase::Deployment))?;
            let address = deployed_address(&target, &receipt).map_err(fail(Phase::Deployment))?;
            let deployed = step
                .artifact()
                .cloned()
                .ok_or_else(|| {
                    ScriptError::Unresolved(format!("step for `{}` lost its artifact", target))
                })
                .map_err(fail(Phase::Deployment))?;
            net.registry_mut()
                .record_deployment(deployed, address)
                .map_err(fail(Phase::Deployment))?;
            info!(contract = %target, %address, tx = %receipt.transaction_hash, "deployed");

            let transaction_hash = receipt.transaction_hash;
            StepOutcome::Deployed { target: target.clone(), address, transaction_hash }
        }
    };

    step.validation(net).map_err(fail(Phase::Validation))?;
    step.execution(net).map_err(fail(Phase::Execution))?;
    net.registry_mut().mark_configured(&target);

    Ok(outcome)
}

/// The address a deployment receipt reports, failing on reverts
fn deployed_address(target: &str, receipt: &Receipt) -> Result<Address, ScriptError> {
    match receipt {
        Receipt { success: true, deployed_address: Some(address), .. } => Ok(*address),
        _ => Err(ScriptError::ContractDeployment(format!(
            "deployment of `{}` failed in {:#x}",
            target, receipt.transaction_hash
        ))),
    }
}
