//! Library interface for the `apidrift` CLI.
//!
//! Exposes the argument parser, the command implementations, and report
//! rendering so they can be tested without spawning the binary. The entry
//! point is in `main.rs`.
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Available subcommands
//! - [`commands`] - Command implementations
//! - [`report`] - Diff rendering as JSON, Markdown, or text

pub mod commands;
pub mod report;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Configure global color output. Call once at startup.
    pub fn apply(self) {
        match self {
            Self::Auto => {} // owo-colors auto-detects by default
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG             Log filter (e.g., debug, apidrift_core=trace)
    APIDRIFT_LOG_PATH    Explicit log file path
    APIDRIFT_LOG_DIR     Log directory
";

/// Command-line interface definition for apidrift.
#[derive(Parser)]
#[command(name = "apidrift")]
#[command(about = "Extract Go API contracts and detect breaking changes between versions", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Extract the API contract of a Go package
    Extract(commands::extract::ExtractArgs),

    /// Compare two saved contracts
    Compare(commands::compare::CompareArgs),

    /// Compare a package between two git references
    Diff(commands::diff::DiffArgs),

    /// List release tags, newest first
    Tags(commands::tags::TagsArgs),

    /// Show package and configuration information
    Info(commands::info::InfoArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filter_flags_parse_on_extract() {
        let cli = Cli::try_parse_from(["apidrift", "extract", "./pkg", "--include-private"]).unwrap();
        match cli.command {
            Commands::Extract(args) => {
                assert_eq!(args.path, "./pkg");
                assert!(args.filters.include_private);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn diff_takes_reference_range() {
        let cli = Cli::try_parse_from(["apidrift", "-q", "diff", "--from", "v1.0.0", "--to", "main"]).unwrap();
        assert!(cli.quiet);
        match cli.command {
            Commands::Diff(args) => {
                assert_eq!(args.from.as_deref(), Some("v1.0.0"));
                assert_eq!(args.to.as_deref(), Some("main"));
            }
            _ => panic!("expected diff"),
        }
    }
}
