//! Diff command: compare a package between two git references.

use std::time::Duration;

use anyhow::{Context, bail};
use apidrift_core::config::Config;
use apidrift_core::diff::{DiffOptions, Differ};
use apidrift_core::extract::Strategy;
use apidrift_core::vcs::{VcsAdapter, WORKING_TREE};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use tracing::{info, instrument};

use super::{FilterArgs, report_diff, spinner};
use crate::report::Format;

/// Arguments for the `diff` subcommand.
#[derive(Args, Debug, Default)]
pub struct DiffArgs {
    /// Baseline reference (default: newest release tag)
    #[arg(long, value_name = "REF")]
    pub from: Option<String>,

    /// Candidate reference (default: the working tree)
    #[arg(long, value_name = "REF")]
    pub to: Option<String>,

    /// Package path relative to the current directory
    #[arg(long, value_name = "PATH")]
    pub package: Option<Utf8PathBuf>,

    /// Parse without resolving names
    #[arg(long)]
    pub syntax_only: bool,

    /// Report format: json, markdown, or text
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Do not report doc comment changes on methods
    #[arg(long)]
    pub ignore_comments: bool,

    /// Give up on git after SECS seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Write the report to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<Utf8PathBuf>,

    /// Exit successfully even when breaking changes are found
    #[arg(long)]
    pub allow_breaking: bool,

    #[command(flatten)]
    pub filters: FilterArgs,
}

/// Materialize the references, extract both sides, and report.
#[instrument(name = "cmd_diff", skip_all)]
pub fn cmd_diff(
    args: DiffArgs,
    global_json: bool,
    quiet: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let format = Format::resolve(args.format.as_deref(), config.report.format.as_deref(), global_json)?;

    let mut options = config.vcs_options();
    options.extract = args.filters.apply(options.extract);
    if let Some(package) = args.package {
        options.package = package;
    }
    if args.syntax_only {
        options.strategy = Strategy::Syntax;
    }
    if let Some(secs) = args.timeout {
        options.timeout = Some(Duration::from_secs(secs));
    }

    let adapter = VcsAdapter::new(cwd, options).context("failed to open repository")?;
    let from = match args.from {
        Some(reference) => reference,
        None => {
            let tags = adapter.list_version_tags(config.tag_pattern())?;
            let Some(latest) = tags.into_iter().next() else {
                bail!("no tag matches {:?}; pass --from", config.tag_pattern());
            };
            latest
        }
    };

    let differ = Differ::new(DiffOptions {
        ignore_comments: config.diff.ignore_comments || args.ignore_comments,
        ..config.diff
    });
    let target = args.to.as_deref().unwrap_or(WORKING_TREE);
    let progress = spinner(format!("Comparing {from} with {target}..."), quiet);
    let result = adapter.compare_refs(&from, args.to.as_deref(), &differ);
    progress.finish_and_clear();
    let diff = result.with_context(|| format!("failed to compare {from} with {target}"))?;

    info!(
        from = %from,
        to = %target,
        breaking = diff.summary.total_breaking_changes,
        "compared references"
    );
    report_diff(&diff, format, args.output.as_deref(), args.allow_breaking)
}
