//! Layered configuration.
//!
//! Sources are merged lowest precedence first:
//!
//! 1. built-in defaults
//! 2. the user file, `config.<ext>` in the platform config directory
//!    (`~/.config/apidrift/` on Linux)
//! 3. the project file, `.apidrift.<ext>` or `apidrift.<ext>` in the search
//!    directory or the nearest parent, stopping at a `.git` boundary
//! 4. files passed explicitly, in the order given
//!
//! `<ext>` is `toml`, `yaml`, `yml`, or `json`.
//!
//! ```no_run
//! use apidrift_core::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_project_search("services/billing")
//!     .load()
//!     .expect("valid configuration");
//! let vcs = config.vcs_options();
//! ```

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::diff::DiffOptions;
use crate::error::{ConfigError, ConfigResult};
use crate::extract::{ExtractOptions, Strategy};
use crate::vcs::VcsOptions;

/// Tags considered releases when no pattern is configured.
pub const DEFAULT_TAG_PATTERN: &str = r"^v\d+\.\d+\.\d+$";

/// Application configuration.
///
/// Every section is optional in the files; missing values keep their
/// defaults and command-line flags override whatever was loaded.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Minimum level written to the log.
    pub log_level: LogLevel,
    /// Directory for JSONL log files (platform default when unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Extraction filters.
    pub extract: ExtractOptions,
    /// Comparison settings.
    pub diff: DiffOptions,
    /// Version-control settings for `diff` and `tags`.
    pub vcs: VcsConfig,
    /// Report rendering.
    pub report: ReportConfig,
}

impl Config {
    /// Adapter options built from the `extract` and `vcs` sections.
    pub fn vcs_options(&self) -> VcsOptions {
        VcsOptions {
            extract: self.extract,
            strategy: self.vcs.strategy.unwrap_or_default(),
            package: self.vcs.package.clone().unwrap_or_default(),
            timeout: self.vcs.timeout_secs.map(Duration::from_secs),
        }
    }

    /// The configured tag pattern, or [`DEFAULT_TAG_PATTERN`].
    pub fn tag_pattern(&self) -> &str {
        self.vcs.tag_pattern.as_deref().unwrap_or(DEFAULT_TAG_PATTERN)
    }
}

/// `[vcs]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct VcsConfig {
    /// Regular expression selecting release tags.
    pub tag_pattern: Option<String>,
    /// Deadline for the git work of one command, in seconds.
    pub timeout_secs: Option<u64>,
    /// Package path relative to the repository root.
    pub package: Option<Utf8PathBuf>,
    /// Extraction strategy (`resolved` or `syntax`).
    pub strategy: Option<Strategy>,
}

/// `[report]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportConfig {
    /// Default output format: `json`, `markdown`, or `text`.
    pub format: Option<String>,
}

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-file extraction decisions.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Fallbacks and recoverable problems.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for platform directories and config file names.
const APP_NAME: &str = "apidrift";

/// A directory holding this entry is a repository root; project search
/// does not climb past it.
const BOUNDARY_MARKER: &str = ".git";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// A loader that reads the user file and stops project search at `.git`.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            explicit_files: Vec::new(),
        }
    }

    /// Look for a project file in `path` and its parents.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Whether to read the user file.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Add a file that overrides everything discovered. Later files win.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Every file that would be merged, lowest precedence first.
    pub fn sources(&self) -> Vec<Utf8PathBuf> {
        let mut files = Vec::new();
        if self.include_user_config
            && let Some(user) = find_user_config()
        {
            files.push(user);
        }
        if let Some(root) = &self.project_search_root
            && let Some(project) = find_project_config(root)
        {
            files.push(project);
        }
        files.extend(self.explicit_files.iter().cloned());
        files
    }

    /// Merge all sources into a [`Config`].
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        let sources = self.sources();
        tracing::debug!(count = sources.len(), "loading configuration");

        let figment = sources.iter().fold(
            Figment::new().merge(Serialized::defaults(Config::default())),
            |figment, path| merge_file(figment, path),
        );
        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::debug!(log_level = config.log_level.as_str(), "configuration loaded");
        Ok(config)
    }

}

fn find_user_config() -> Option<Utf8PathBuf> {
    let dir = user_config_dir()?;
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("config.{ext}")))
        .find(|path| path.is_file())
}

fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
        Some("json") => figment.merge(Json::file_exact(path.as_str())),
        _ => figment.merge(Toml::file_exact(path.as_str())),
    }
}

/// The project file that applies to `start`: the nearest one in `start` or
/// its parents, up to and including the repository root.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    for dir in start.as_ref().ancestors() {
        let found = CONFIG_EXTENSIONS.iter().find_map(|ext| {
            [format!(".{APP_NAME}.{ext}"), format!("{APP_NAME}.{ext}")]
                .into_iter()
                .map(|name| dir.join(name))
                .find(|path| path.is_file())
        });
        if found.is_some() {
            return found;
        }
        if dir.join(BOUNDARY_MARKER).exists() {
            tracing::debug!(%dir, "project config search stopped at repository root");
            break;
        }
    }
    None
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Platform config directory, e.g. `~/.config/apidrift/`.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.config_dir().to_path_buf()).ok()
}

/// Platform data directory, e.g. `~/.local/share/apidrift/`; log files go
/// here when nothing else is configured.
pub fn user_data_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.data_dir().to_path_buf()).ok()
}
