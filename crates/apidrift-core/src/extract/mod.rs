//! Contract extraction from Go source.
//!
//! Two strategies produce a [`Contract`] from a package:
//!
//! - [`PackageExtractor`] resolves the package as a whole: it accepts import
//!   paths and `dir/...` patterns, checks every file, follows named types to
//!   their underlying representation, flattens embedded interfaces, and
//!   evaluates constant expressions. All problems are reported together.
//! - [`DirectoryExtractor`] works purely from syntax on one directory and
//!   stops at the first parse error.
//!
//! Both implement [`ContractSource`] and share the same contract builder, so
//! they agree on everything that does not need resolution.

mod builder;
mod consteval;
pub mod constraint;
mod directory;
mod module;
mod package;
mod scope;

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::contract::Contract;

pub use constraint::BuildTarget;
pub use directory::DirectoryExtractor;
pub use module::GoModule;
pub use package::PackageExtractor;

/// Errors from contract extraction.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The target did not resolve to any package.
    #[error("no Go packages found matching '{target}'")]
    NoPackagesFound {
        /// Directory, import path, or pattern that was requested.
        target: String,
    },

    /// The package failed to load; every problem found is listed.
    #[error("package {package} has errors:\n{}", messages.join("\n"))]
    PackageErrors {
        /// Package (or directory) name.
        package: String,
        /// One message per problem, in file order.
        messages: Vec<String>,
    },

    /// The directory holds no eligible `.go` files.
    #[error("no Go source files found in {dir}")]
    NoSourceFilesFound {
        /// Directory that was scanned.
        dir: Utf8PathBuf,
    },

    /// A file failed to parse.
    #[error("{file}:{line}:{column}: {message}")]
    Parse {
        /// Path of the offending file.
        file: Utf8PathBuf,
        /// 1-based line.
        line: usize,
        /// 1-based column.
        column: usize,
        /// Parser message.
        message: String,
    },

    /// Reading a file or directory failed.
    #[error("failed to read {path}")]
    Io {
        /// Path being read.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The Go grammar could not be loaded into the parser.
    #[error("failed to load Go grammar: {0}")]
    Grammar(#[from] tree_sitter::LanguageError),
}

/// Result alias for extraction.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Anything that can produce a [`Contract`] for a target.
pub trait ContractSource {
    /// Extract the contract of the package at `target`.
    fn extract(&self, target: &Utf8Path) -> ExtractResult<Contract>;
}

/// Filters applied while extracting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Include unexported identifiers.
    pub include_private: bool,
    /// Include `_test.go` files.
    pub include_tests: bool,
    /// Descend into `internal` directories when expanding `...` patterns.
    pub include_internal: bool,
    /// Platform that decides which files are part of the package.
    pub target: BuildTarget,
}

/// Which extractor to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// [`PackageExtractor`].
    #[default]
    Resolved,
    /// [`DirectoryExtractor`].
    Syntax,
}

impl Strategy {
    /// Build the extractor for this strategy.
    pub fn source(self, options: ExtractOptions) -> Box<dyn ContractSource> {
        match self {
            Self::Resolved => Box::new(PackageExtractor::new(options)),
            Self::Syntax => Box::new(DirectoryExtractor::new(options)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved => write!(f, "resolved"),
            Self::Syntax => write!(f, "syntax"),
        }
    }
}

/// One `.go` file read from a package directory.
#[derive(Debug, Clone)]
pub(crate) struct SourceFile {
    /// File name relative to the package directory.
    pub name: String,
    /// File contents.
    pub text: String,
}

/// Whether a file name is a Go source file the toolchain would consider
/// for the configured target.
pub(crate) fn is_eligible_file(name: &str, options: &ExtractOptions) -> bool {
    name.ends_with(".go")
        && !name.starts_with('.')
        && !name.starts_with('_')
        && (options.include_tests || !name.ends_with("_test.go"))
        && options.target.matches_file_name(name)
}

/// Whether a directory name can never hold a package.
pub(crate) fn is_skipped_dir(name: &str) -> bool {
    name == "testdata" || name == "vendor" || name.starts_with('.') || name.starts_with('_')
}

/// Read every eligible `.go` file directly inside `dir` whose build
/// constraints hold, sorted by name.
pub(crate) fn read_sources(dir: &Utf8Path, options: &ExtractOptions) -> ExtractResult<Vec<SourceFile>> {
    let io_err = |source| ExtractError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in dir.read_dir_utf8().map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name();
        if !is_eligible_file(name, options) || !entry.path().is_file() {
            continue;
        }
        let text = std::fs::read_to_string(entry.path()).map_err(|source| ExtractError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        if !options.target.matches_source(&text) {
            debug!(file = name, target = %options.target, "excluded by build constraints");
            continue;
        }
        files.push(SourceFile {
            name: name.to_string(),
            text,
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(%dir, count = files.len(), "read package sources");
    Ok(files)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// A temp directory pre-populated with `(name, contents)` files.
    pub(crate) fn package(files: &[(&str, &str)]) -> (TempDir, Utf8PathBuf) {
        let tmp = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).expect("utf8 tempdir");
        for (name, contents) in files {
            let path = root.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).expect("mkdir");
            }
            std::fs::write(&path, contents).expect("write fixture");
        }
        (tmp, root)
    }

    #[test]
    fn eligible_files() {
        let opts = ExtractOptions::default();
        assert!(is_eligible_file("api.go", &opts));
        assert!(!is_eligible_file("api_test.go", &opts));
        assert!(!is_eligible_file("_gen.go", &opts));
        assert!(!is_eligible_file(".hidden.go", &opts));
        assert!(!is_eligible_file("README.md", &opts));

        let with_tests = ExtractOptions {
            include_tests: true,
            ..ExtractOptions::default()
        };
        assert!(is_eligible_file("api_test.go", &with_tests));
    }

    fn for_target(goos: &str, goarch: &str) -> ExtractOptions {
        ExtractOptions {
            target: BuildTarget::new(goos, goarch).expect("known target"),
            ..ExtractOptions::default()
        }
    }

    #[test]
    fn read_sources_selects_files_for_the_target() {
        let (_tmp, dir) = package(&[
            ("api.go", "package demo\n"),
            ("open_linux.go", "package demo\n"),
            ("open_windows.go", "package demo\n"),
            ("posix.go", "//go:build !windows\n\npackage demo\n"),
            ("win.go", "//go:build windows\n\npackage demo\n"),
            ("gen.go", "//go:build ignore\n\npackage main\n"),
        ]);
        let names = |opts: &ExtractOptions| -> Vec<String> {
            read_sources(&dir, opts)
                .expect("read")
                .into_iter()
                .map(|f| f.name)
                .collect()
        };
        assert_eq!(names(&for_target("linux", "amd64")), ["api.go", "open_linux.go", "posix.go"]);
        assert_eq!(names(&for_target("windows", "amd64")), ["api.go", "open_windows.go", "win.go"]);
    }

    #[test]
    fn read_sources_is_sorted_and_flat() {
        let (_tmp, dir) = package(&[
            ("b.go", "package demo\n"),
            ("a.go", "package demo\n"),
            ("notes.txt", "hi"),
            ("sub/c.go", "package sub\n"),
        ]);
        let files = read_sources(&dir, &ExtractOptions::default()).expect("read");
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.go", "b.go"]);
    }

    #[test]
    fn read_sources_reports_missing_dir() {
        let err = read_sources(Utf8Path::new("/definitely/not/here"), &ExtractOptions::default())
            .expect_err("missing dir");
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: ExtractOptions =
            serde_json::from_str(r#"{"include_private": true}"#).expect("parse");
        assert!(opts.include_private);
        assert!(!opts.include_tests);
    }

    #[test]
    fn strategy_display() {
        assert_eq!(Strategy::Resolved.to_string(), "resolved");
        assert_eq!(Strategy::default(), Strategy::Resolved);
    }
}
