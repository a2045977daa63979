//! Command implementations

pub mod compare;

pub mod diff;

pub mod extract;

pub mod info;

pub mod tags;

use std::io::IsTerminal;
use std::time::Duration;

use anyhow::{Context, bail};
use apidrift_core::contract::ContractDiff;
use apidrift_core::extract::ExtractOptions;
use camino::Utf8Path;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::report::{self, Format};

/// Extraction filter flags shared by `extract` and `diff`.
#[derive(clap::Args, Debug, Default, Clone, Copy)]
pub struct FilterArgs {
    /// Include unexported identifiers
    #[arg(long)]
    pub include_private: bool,

    /// Include declarations from `_test.go` files
    #[arg(long)]
    pub include_tests: bool,

    /// Descend into `internal` directories when expanding `...` patterns
    #[arg(long)]
    pub include_internal: bool,
}

impl FilterArgs {
    /// Flags switch filters on; they never switch configured ones off.
    pub const fn apply(self, configured: ExtractOptions) -> ExtractOptions {
        ExtractOptions {
            include_private: configured.include_private || self.include_private,
            include_tests: configured.include_tests || self.include_tests,
            include_internal: configured.include_internal || self.include_internal,
            target: configured.target,
        }
    }
}

/// Write `text` to `output`, or to stdout when no file is given.
pub fn emit(text: &str, output: Option<&Utf8Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("failed to write {path}"))?;
            tracing::debug!(%path, bytes = text.len(), "wrote output");
        }
        None if text.ends_with('\n') => print!("{text}"),
        None => println!("{text}"),
    }
    Ok(())
}

/// Render and emit a diff, then fail if it is breaking and that is not
/// allowed.
pub fn report_diff(
    diff: &ContractDiff,
    format: Format,
    output: Option<&Utf8Path>,
    allow_breaking: bool,
) -> anyhow::Result<()> {
    let rendered = report::render(diff, format).context("failed to render report")?;
    emit(&rendered, output)?;

    let summary = &diff.summary;
    if output.is_some() {
        eprintln!(
            "{} {} breaking, {} added, {} modified",
            if summary.has_breaking_changes { "✗".red().to_string() } else { "✓".green().to_string() },
            summary.total_breaking_changes,
            summary.total_additions,
            summary.total_modifications,
        );
    }
    if summary.has_breaking_changes && !allow_breaking {
        bail!("{} breaking change(s) detected", summary.total_breaking_changes);
    }
    Ok(())
}

/// A stderr spinner, hidden when quiet or when stderr is not a terminal.
pub fn spinner(message: impl Into<String>, quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"]));
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;
    use apidrift_core::extract::BuildTarget;

    #[test]
    fn filter_flags_only_widen() {
        let configured = ExtractOptions {
            include_private: true,
            ..ExtractOptions::default()
        };
        let merged = FilterArgs {
            include_tests: true,
            ..FilterArgs::default()
        }
        .apply(configured);
        assert!(merged.include_private);
        assert!(merged.include_tests);
        assert!(!merged.include_internal);
    }

    #[test]
    fn configured_target_is_kept() {
        let configured = ExtractOptions {
            target: BuildTarget::new("windows", "arm64").expect("known target"),
            ..ExtractOptions::default()
        };
        let merged = FilterArgs::default().apply(configured);
        assert_eq!(merged.target.to_string(), "windows/arm64");
    }

    #[test]
    fn breaking_diff_fails_unless_allowed() {
        let mut diff = ContractDiff {
            package_name: "demo".into(),
            old_version: String::new(),
            new_version: String::new(),
            breaking_changes: Vec::new(),
            added_items: Vec::new(),
            modified_items: Vec::new(),
            summary: Default::default(),
        };
        let tmp = tempfile::TempDir::new().unwrap();
        let out = camino::Utf8PathBuf::try_from(tmp.path().join("report.md")).unwrap();
        assert!(report_diff(&diff, Format::Markdown, Some(&out), false).is_ok());

        diff.summary.total_breaking_changes = 2;
        diff.summary.has_breaking_changes = true;
        let err = report_diff(&diff, Format::Text, Some(&out), false).unwrap_err();
        assert_eq!(err.to_string(), "2 breaking change(s) detected");
        assert!(report_diff(&diff, Format::Json, Some(&out), true).is_ok());
    }
}
