//! Binary entry point for the `ehprov` CLI.

mod cli;

use std::env;
use std::error::Error as StdError;
use std::future;
use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ehprov::names::is_valid_resource_group_name;
use ehprov::test_support::{Operation, SCRIPTED_SUBSCRIPTION_ID, ScriptedManager};
use ehprov::{
    AzureConfig, AzureResourceManager, CleanupOutcome, ProvisionOrchestrator, ProvisionPlan,
    ProvisionReport, Region, ResourceId, ResourceManager,
};

use cli::{CleanupCommand, Cli, RunCommand};

#[cfg(test)]
mod test_helpers;

/// Runs the CLI against the in-memory manager instead of Azure. The value is
/// `succeed` or a comma-separated list of `fail:<operation>` directives.
const FAKE_RUN_MODE_ENV: &str = "EHPROV_FAKE_RUN_MODE";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("{0}")]
    Provision(String),
    #[error("cleanup of resource group {group} failed: {message}")]
    Cleanup { group: String, message: String },
    #[error("invalid resource group name: {0}")]
    InvalidResourceGroup(String),
    #[error("invalid {FAKE_RUN_MODE_ENV} value: {0}")]
    FakeMode(String),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stdout)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    if let Some(failures) = fake_run_mode()? {
        return dispatch_fake(&cli, &failures).await;
    }

    match cli {
        Cli::Run(args) => run_command(&args).await,
        Cli::Cleanup(args) => cleanup_command(&args).await,
    }
}

async fn run_command(args: &RunCommand) -> Result<(), CliError> {
    let mut config = load_config()?;
    apply_overrides(&mut config, args);
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;

    let manager =
        AzureResourceManager::from_config(&config).map_err(|err| CliError::Backend(err.to_string()))?;
    let plan = ProvisionPlan::from_config(&config);
    provision(manager, &plan).await
}

async fn cleanup_command(args: &CleanupCommand) -> Result<(), CliError> {
    check_resource_group(&args.resource_group)?;
    let config = load_config()?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;

    let manager =
        AzureResourceManager::from_config(&config).map_err(|err| CliError::Backend(err.to_string()))?;
    let group = ResourceId::resource_group(manager.subscription_id(), &args.resource_group);
    delete_group(&manager, &group).await
}

fn load_config() -> Result<AzureConfig, CliError> {
    AzureConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))
}

fn apply_overrides(config: &mut AzureConfig, args: &RunCommand) {
    if let Some(region) = &args.region {
        config.region.clone_from(region);
    }
    if let Some(region) = &args.storage_region {
        config.storage_region.clone_from(region);
    }
}

fn check_resource_group(name: &str) -> Result<(), CliError> {
    if is_valid_resource_group_name(name) {
        Ok(())
    } else {
        Err(CliError::InvalidResourceGroup(name.to_owned()))
    }
}

async fn provision<M>(manager: M, plan: &ProvisionPlan) -> Result<(), CliError>
where
    M: ResourceManager,
{
    let orchestrator = ProvisionOrchestrator::new(manager);
    let report = orchestrator
        .execute_until(plan, shutdown_signal())
        .await
        .map_err(|err| CliError::Provision(error_chain(&err)))?;
    log_report(&report);
    Ok(())
}

async fn delete_group<M>(manager: &M, group: &ResourceId) -> Result<(), CliError>
where
    M: ResourceManager,
{
    info!(id = %group, "deleting resource group");
    manager
        .delete_resource_group(group)
        .await
        .map_err(|err| CliError::Cleanup {
            group: group.name().to_owned(),
            message: err.to_string(),
        })?;
    info!(id = %group, "deleted resource group");
    Ok(())
}

/// Renders an error followed by each of its sources, separated by `: `.
fn error_chain(err: &dyn StdError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

fn log_report(report: &ProvisionReport) {
    let summary = &report.summary;
    info!(
        namespace = %summary.namespace.name,
        storage_account = %summary.storage_account.name,
        event_hubs = summary.event_hubs.len(),
        consumer_groups = summary.consumer_groups.len(),
        "provisioning walkthrough finished"
    );
    if let CleanupOutcome::Failed { message } = &report.cleanup {
        warn!(
            resource_group = %summary.resource_group.name,
            error = %message,
            "resource group was not deleted; remove it with `ehprov cleanup {}`",
            summary.resource_group.name
        );
    }
}

/// Resolves on Ctrl-C or, on Unix, `SIGTERM`. A handler that cannot be
/// installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    warn!("shutdown requested, cleaning up");
}

fn fake_run_mode() -> Result<Option<Vec<Operation>>, CliError> {
    env::var(FAKE_RUN_MODE_ENV)
        .ok()
        .map(|mode| parse_fake_mode(&mode))
        .transpose()
}

fn parse_fake_mode(mode: &str) -> Result<Vec<Operation>, CliError> {
    if mode.trim() == "succeed" {
        return Ok(Vec::new());
    }
    mode.split(',')
        .map(|directive| {
            directive
                .trim()
                .strip_prefix("fail:")
                .and_then(Operation::from_name)
                .ok_or_else(|| CliError::FakeMode(mode.to_owned()))
        })
        .collect()
}

async fn dispatch_fake(cli: &Cli, failures: &[Operation]) -> Result<(), CliError> {
    let manager = ScriptedManager::new();
    for operation in failures {
        manager.fail_on(*operation);
    }

    match cli {
        Cli::Run(args) => {
            let plan = ProvisionPlan::generate(
                Region::new(args.region.as_deref().unwrap_or("eastus")),
                Region::new(args.storage_region.as_deref().unwrap_or("eastus2")),
            );
            provision(manager, &plan).await
        }
        Cli::Cleanup(args) => {
            check_resource_group(&args.resource_group)?;
            let group = ResourceId::resource_group(SCRIPTED_SUBSCRIPTION_ID, &args.resource_group);
            delete_group(&manager, &group).await
        }
    }
}

fn report_error(err: &CliError) {
    error!(error = %err, "ehprov failed");
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
