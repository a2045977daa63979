//! Extract command: write a package's API contract as JSON.

use anyhow::Context;
use apidrift_core::config::Config;
use apidrift_core::extract::Strategy;
use camino::Utf8PathBuf;
use clap::Args;
use tracing::{info, instrument};

use super::{FilterArgs, emit};

/// Arguments for the `extract` subcommand.
#[derive(Args, Debug, Default)]
pub struct ExtractArgs {
    /// Package directory, import path, or `dir/...` pattern
    #[arg(default_value = ".")]
    pub path: Utf8PathBuf,

    /// Parse the directory without resolving names (works on packages that
    /// do not compile)
    #[arg(long)]
    pub syntax_only: bool,

    /// Write the contract to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<Utf8PathBuf>,

    /// Version label recorded in the contract
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,

    #[command(flatten)]
    pub filters: FilterArgs,
}

/// Extract a contract and print or save it.
#[instrument(name = "cmd_extract", skip_all, fields(path = %args.path))]
pub fn cmd_extract(args: ExtractArgs, config: &Config) -> anyhow::Result<()> {
    let options = args.filters.apply(config.extract);
    let strategy = if args.syntax_only {
        Strategy::Syntax
    } else {
        config.vcs.strategy.unwrap_or_default()
    };

    // relative paths and import paths resolve from the working directory
    let mut contract = strategy
        .source(options)
        .extract(&args.path)
        .with_context(|| format!("failed to extract {}", args.path))?;
    if let Some(version) = args.version {
        contract.version = version;
    }
    info!(
        package = %contract.package_name,
        %strategy,
        items = contract.len(),
        "extracted contract"
    );

    match args.output.as_deref() {
        Some(path) => contract
            .write_to(path)
            .with_context(|| format!("failed to save contract to {path}")),
        None => emit(&contract.to_json()?, None),
    }
}
