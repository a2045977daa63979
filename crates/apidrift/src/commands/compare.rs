//! Compare command: diff two saved contracts.

use anyhow::Context;
use apidrift_core::config::Config;
use apidrift_core::contract::Contract;
use apidrift_core::diff::{DiffOptions, Differ};
use camino::Utf8PathBuf;
use clap::Args;
use tracing::{debug, instrument};

use super::report_diff;
use crate::report::Format;

/// Arguments for the `compare` subcommand.
#[derive(Args, Debug, Default)]
pub struct CompareArgs {
    /// Baseline contract (JSON written by `extract`)
    pub old: Utf8PathBuf,

    /// Candidate contract
    pub new: Utf8PathBuf,

    /// Report format: json, markdown, or text
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Do not report doc comment changes on methods
    #[arg(long)]
    pub ignore_comments: bool,

    /// Write the report to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<Utf8PathBuf>,

    /// Exit successfully even when breaking changes are found
    #[arg(long)]
    pub allow_breaking: bool,
}

/// Load both contracts, compare them, and report.
#[instrument(name = "cmd_compare", skip_all, fields(old = %args.old, new = %args.new))]
pub fn cmd_compare(args: CompareArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    let format = Format::resolve(args.format.as_deref(), config.report.format.as_deref(), global_json)?;

    let old = Contract::read_from(&args.old).context("failed to load old contract")?;
    let new = Contract::read_from(&args.new).context("failed to load new contract")?;

    let differ = Differ::new(DiffOptions {
        ignore_comments: config.diff.ignore_comments || args.ignore_comments,
        ..config.diff
    });
    let diff = differ.diff(&old, &new);
    debug!(breaking = diff.summary.total_breaking_changes, ?format, "compared contracts");

    report_diff(&diff, format, args.output.as_deref(), args.allow_breaking)
}
