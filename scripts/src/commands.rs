//! The migration command: assembles the registry, config, and network from the CLI
//! arguments, runs the project's migrations, and persists the deployments record

use eyre::{bail, eyre, Result};
use tracing::{info, warn};

use crate::{
    artifacts::load_artifacts,
    cli::Cli,
    config::MigrationConfig,
    constants::DEFAULT_RPC_URL,
    migration::{Migration, MigrationReport, StepOutcome},
    network::{Network, RpcNetwork},
    registry::{ContractRegistry, DeploymentsRecord},
    steps::{migrations, DeploymentStep},
    utils::{deployments_path, load_signer},
};

/// Run the project's migrations as configured by `cli`
pub fn migrate(cli: &Cli) -> Result<MigrationReport> {
    run_migration(cli, migrations())
}

/// Run `steps` against the network `cli` selects
pub fn run_migration(cli: &Cli, steps: Vec<Box<dyn DeploymentStep>>) -> Result<MigrationReport> {
    if cli.threshold != 1 {
        bail!("a signature threshold of {} is not supported, only 1", cli.threshold);
    }

    let config = match &cli.config {
        Some(path) => MigrationConfig::from_file(path)?,
        None => MigrationConfig::default(),
    };

    let registry = build_registry(cli)?;
    let mut net = connect(cli, registry, config)?;
    run_on(cli, &mut net, steps)
}

/// Run `steps` on `net`, filtered and labelled as configured by `cli`.
///
/// With `--record`, the registry is written back to the deployments record whether
/// or not the migration completes, so that a halted run can be resumed.
pub fn run_on(
    cli: &Cli,
    net: &mut dyn Network,
    steps: Vec<Box<dyn DeploymentStep>>,
) -> Result<MigrationReport> {
    let result = Migration::new(steps, &cli.filter, &cli.snapshot).run(net);

    if cli.record {
        if cli.test {
            warn!("not recording deployments made on a throwaway node");
        } else {
            let path = deployments_path(&cli.datadir, &cli.chain);
            net.registry().to_record(&cli.snapshot).write(&path)?;
            info!(path = %path.display(), "recorded deployments");
        }
    }

    let report = result?;
    log_report(&report);
    Ok(report)
}

/// Load the compiled artifacts and seed them with the chain's recorded deployments
fn build_registry(cli: &Cli) -> Result<ContractRegistry> {
    let (_, ordered) = load_artifacts(&cli.artifacts)?;
    if ordered.is_empty() {
        bail!("no compiled contracts found in {}", cli.artifacts.display());
    }

    let mut registry = ContractRegistry::new(ordered);
    let path = deployments_path(&cli.datadir, &cli.chain);
    if let Some(record) = DeploymentsRecord::read(&path)? {
        let snapshot = &record.snapshot;
        info!(path = %path.display(), %snapshot, "resuming from recorded deployments");
        registry.seed(&record);
    }

    Ok(registry)
}

/// Build the network facade the migration runs against: a freshly spawned Anvil
/// node for `--test`, else the configured node signing with the deployer's key
fn connect(cli: &Cli, registry: ContractRegistry, config: MigrationConfig) -> Result<RpcNetwork> {
    if cli.test {
        let mut net = RpcNetwork::spawn_anvil(registry, config, cli.verify)?;
        if let Some(from) = cli.from {
            net.set_sender(from)?;
        }
        return Ok(net);
    }

    let signer = load_signer(cli.keystore.as_deref(), cli.priv_key.as_deref())?;
    if let Some(from) = cli.from {
        if from != signer.address() {
            return Err(eyre!(
                "--from {:#x} does not match the signer {:#x}",
                from,
                signer.address()
            ));
        }
    }

    let chain = config.chains.get(&cli.chain).cloned();
    let rpc_url = cli
        .rpc_url
        .clone()
        .or_else(|| chain.as_ref().map(|c| c.rpc_url.clone()))
        .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
    let chain_id = chain.and_then(|c| c.chain_id);

    Ok(RpcNetwork::connect(&rpc_url, signer, chain_id, registry, config, cli.verify)?)
}

/// Log a summary line per step
fn log_report(report: &MigrationReport) {
    for outcome in report.steps.iter() {
        match outcome {
            StepOutcome::Skipped { target } => info!(contract = %target, "skipped"),
            StepOutcome::Resumed { target, address } => {
                info!(contract = %target, %address, "configured at recorded address")
            }
            StepOutcome::Deployed { target, address, transaction_hash } => {
                info!(contract = %target, %address, tx = %transaction_hash, "deployed")
            }
        }
    }
}
