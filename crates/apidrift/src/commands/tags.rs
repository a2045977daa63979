//! Tags command: list release tags, newest first.

use anyhow::Context;
use apidrift_core::config::Config;
use apidrift_core::vcs::VcsAdapter;
use camino::Utf8Path;
use clap::Args;
use tracing::{debug, instrument};

/// Arguments for the `tags` subcommand.
#[derive(Args, Debug, Default)]
pub struct TagsArgs {
    /// Regular expression selecting tags (default from config, else
    /// `vMAJOR.MINOR.PATCH`)
    #[arg(long, value_name = "REGEX")]
    pub pattern: Option<String>,
}

/// Print matching tags, one per line or as a JSON array.
#[instrument(name = "cmd_tags", skip_all, fields(json_output))]
pub fn cmd_tags(args: TagsArgs, global_json: bool, config: &Config, cwd: &Utf8Path) -> anyhow::Result<()> {
    let pattern = args.pattern.as_deref().unwrap_or_else(|| config.tag_pattern());
    let adapter = VcsAdapter::new(cwd, config.vcs_options()).context("failed to open repository")?;
    let tags = adapter.list_version_tags(pattern)?;
    debug!(json_output = global_json, count = tags.len(), "listing tags");

    if global_json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
    } else {
        for tag in &tags {
            println!("{tag}");
        }
    }
    Ok(())
}
