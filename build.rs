//! Renders manual pages for `ehprov` and each of its subcommands.
//!
//! Pages land in `OUT_DIR` as `ehprov.1`, `ehprov-run.1` and
//! `ehprov-cleanup.1`.

use std::env;
use std::io::Write;
use std::path::PathBuf;

use clap::CommandFactory;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The pages depend on the clap definitions only.
    writeln!(std::io::stdout(), "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or("OUT_DIR is set by cargo for build scripts")?;
    let command = Cli::command().version(env!("CARGO_PKG_VERSION"));
    clap_mangen::generate_to(command, &out_dir)?;
    Ok(())
}
