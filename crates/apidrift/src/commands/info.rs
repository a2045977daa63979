//! Info command: show package, configuration, and environment details.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use apidrift_core::config::{self, Config};
use apidrift_core::git;

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_config_dir: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    strategy: String,
    target: String,
    tag_pattern: String,
    include_private: bool,
    include_tests: bool,
    include_internal: bool,
    ignore_comments: bool,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &camino::Utf8Path) -> Self {
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            user_config_dir: config::user_config_dir().map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            strategy: config.vcs.strategy.unwrap_or_default().to_string(),
            target: config.extract.target.to_string(),
            tag_pattern: config.tag_pattern().to_string(),
            include_private: config.extract.include_private,
            include_tests: config.extract.include_tests,
            include_internal: config.extract.include_internal,
            ignore_comments: config.diff.ignore_comments,
        }
    }
}

#[derive(Serialize)]
struct EnvironmentInfo {
    git_installed: bool,
    in_repository: bool,
}

impl EnvironmentInfo {
    fn gather(cwd: &camino::Utf8Path) -> Self {
        let git_installed = git::is_installed();
        Self {
            git_installed,
            in_repository: git_installed
                && git::Git::new(cwd).is_inside_repo().unwrap_or(false),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
    environment: EnvironmentInfo,
}

/// Print package information.
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    cwd: &camino::Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, cwd),
        environment: EnvironmentInfo::gather(cwd),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let pkg = &info.package;
    println!("{} {}", pkg.name.bold(), pkg.version.green());
    if !pkg.description.is_empty() {
        println!("{}", pkg.description);
    }
    if !pkg.license.is_empty() {
        println!("{}: {}", "License".dimmed(), pkg.license);
    }

    let cfg = &info.config;
    println!();
    println!("{}", "Configuration".bold().underline());
    match &cfg.config_file {
        Some(path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    if let Some(dir) = &cfg.user_config_dir {
        println!("{}: {}", "User config directory".dimmed(), dir);
    }
    println!("{}: {}", "Log level".dimmed(), cfg.log_level);
    if let Some(dir) = &cfg.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }
    println!("{}: {}", "Strategy".dimmed(), cfg.strategy.cyan());
    println!("{}: {}", "Build target".dimmed(), cfg.target);
    println!("{}: {}", "Tag pattern".dimmed(), cfg.tag_pattern.cyan());
    let filters: Vec<&str> = [
        (cfg.include_private, "private"),
        (cfg.include_tests, "tests"),
        (cfg.include_internal, "internal"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
    .collect();
    if filters.is_empty() {
        println!("{}: {}", "Includes".dimmed(), "exported only".dimmed());
    } else {
        println!("{}: {}", "Includes".dimmed(), filters.join(", "));
    }

    let env = &info.environment;
    println!();
    println!("{}", "Environment".bold().underline());
    let mark = |ok: bool| if ok { "✓".green().to_string() } else { "○".yellow().to_string() };
    println!("  {} git installed", mark(env.git_installed));
    println!("  {} inside a git repository", mark(env.in_repository));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cwd() -> camino::Utf8PathBuf {
        camino::Utf8PathBuf::from("/tmp")
    }

    #[test]
    fn text_output_succeeds() {
        assert!(cmd_info(InfoArgs::default(), false, &Config::default(), &test_cwd()).is_ok());
    }

    #[test]
    fn json_output_succeeds() {
        assert!(cmd_info(InfoArgs::default(), true, &Config::default(), &test_cwd()).is_ok());
    }

    #[test]
    fn config_info_reflects_defaults() {
        let cwd = camino::Utf8PathBuf::from("/nonexistent");
        let info = ConfigInfo::from_config(&Config::default(), &cwd);
        assert!(info.config_file.is_none());
        assert_eq!(info.log_level, "info");
        assert_eq!(info.strategy, "resolved");
        assert_eq!(info.target, apidrift_core::extract::BuildTarget::host().to_string());
        assert_eq!(info.tag_pattern, config::DEFAULT_TAG_PATTERN);
        assert!(!info.include_private);
    }
}
