//! Command-line interface definitions for the `ehprov` binary.
//!
//! The clap parser structures live here so both the binary and the build
//! script can use them; the build script renders the manual page from them.

use clap::Parser;

/// Top-level CLI for the `ehprov` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ehprov",
    about = "Provision an Azure Event Hubs capture walkthrough and tear it down again",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Provision the Event Hubs resource graph, list it, then delete it.
    #[command(
        name = "run",
        about = "Provision the Event Hubs resource graph, list it, then delete it"
    )]
    Run(RunCommand),
    /// Delete a resource group left behind by an earlier run.
    #[command(
        name = "cleanup",
        about = "Delete a resource group left behind by an earlier run"
    )]
    Cleanup(CleanupCommand),
}

/// Arguments for the `ehprov run` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct RunCommand {
    /// Override the region used for the resource group and namespace.
    #[arg(long, value_name = "REGION")]
    pub(crate) region: Option<String>,
    /// Override the region used for the capture storage account.
    #[arg(long, value_name = "REGION")]
    pub(crate) storage_region: Option<String>,
}

/// Arguments for the `ehprov cleanup` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct CleanupCommand {
    /// Name of the resource group to delete.
    #[arg(required = true, value_name = "RESOURCE_GROUP")]
    pub(crate) resource_group: String,
}
