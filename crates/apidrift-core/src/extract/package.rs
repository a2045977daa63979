//! Resolved extraction.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, instrument};
use walkdir::WalkDir;

use super::builder::ContractBuilder;
use super::module::GoModule;
use super::scope::{PackageScope, package_names};
use super::{
    ContractSource, ExtractError, ExtractOptions, ExtractResult, is_eligible_file, is_skipped_dir,
    read_sources,
};
use crate::contract::Contract;
use crate::syntax::{GoParser, ParsedFile};

/// Loads a whole package and resolves names across its files.
///
/// `target` may be a directory, an import path inside the module that
/// encloses the working root, or a `dir/...` pattern; for a pattern the
/// first matching package in lexical order is used.
#[derive(Debug, Clone)]
pub struct PackageExtractor {
    options: ExtractOptions,
    root: Option<Utf8PathBuf>,
}

impl PackageExtractor {
    /// Create an extractor that resolves import paths from the current
    /// directory.
    pub const fn new(options: ExtractOptions) -> Self {
        Self {
            options,
            root: None,
        }
    }

    /// Resolve relative targets and import paths from `root` instead of the
    /// current directory.
    pub fn with_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn root(&self) -> Utf8PathBuf {
        self.root.clone().unwrap_or_else(|| Utf8PathBuf::from("."))
    }

    /// Map `target` to the directory of the package to load.
    fn locate(&self, target: &Utf8Path) -> ExtractResult<Utf8PathBuf> {
        let not_found = || ExtractError::NoPackagesFound {
            target: target.to_string(),
        };

        let raw = target.as_str();
        if let Some(base) = raw.strip_suffix("...") {
            let base = base.trim_end_matches('/');
            let base = if base.is_empty() { "." } else { base };
            let dir = self.base_dir(Utf8Path::new(base)).ok_or_else(not_found)?;
            return self.first_package(&dir).ok_or_else(not_found);
        }
        self.base_dir(target).ok_or_else(not_found)
    }

    fn base_dir(&self, target: &Utf8Path) -> Option<Utf8PathBuf> {
        let dir = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.root().join(target)
        };
        if dir.is_dir() {
            return dir.canonicalize_utf8().ok();
        }
        // not a directory: try it as an import path
        let root = self.root().canonicalize_utf8().ok()?;
        let module = GoModule::find(&root).ok()??;
        module.resolve(target.as_str()).filter(|d| d.is_dir())
    }

    fn first_package(&self, base: &Utf8Path) -> Option<Utf8PathBuf> {
        let walker = WalkDir::new(base)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || entry.file_name().to_str().is_some_and(|name| {
                        !is_skipped_dir(name) && (self.options.include_internal || name != "internal")
                    })
            });
        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_dir() {
                continue;
            }
            let Ok(dir) = Utf8PathBuf::try_from(entry.into_path()) else {
                continue;
            };
            if self.has_sources(&dir) {
                debug!(%dir, "pattern matched package");
                return Some(dir);
            }
        }
        None
    }

    fn has_sources(&self, dir: &Utf8Path) -> bool {
        dir.read_dir_utf8().is_ok_and(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|e| is_eligible_file(e.file_name(), &self.options) && e.path().is_file())
        })
    }
}

impl ContractSource for PackageExtractor {
    #[instrument(skip(self), fields(%target))]
    fn extract(&self, target: &Utf8Path) -> ExtractResult<Contract> {
        let dir = self.locate(target)?;
        let sources = read_sources(&dir, &self.options)?;
        if sources.is_empty() {
            return Err(ExtractError::NoSourceFilesFound { dir });
        }

        let mut parser = GoParser::new()?;
        let mut messages = Vec::new();
        let mut files: Vec<ParsedFile> = Vec::new();
        for source in &sources {
            match parser.parse(&source.name, &source.text) {
                // external test packages are separate packages
                Ok(file) if file.package.ends_with("_test") => {
                    debug!(file = %file.name, "skipped external test package");
                }
                Ok(file) => files.push(file),
                Err(errors) => messages.extend(errors.iter().map(ToString::to_string)),
            }
        }

        let fallback = dir.file_name().unwrap_or("package").to_string();
        let names = package_names(&files);
        if names.len() > 1 {
            let found: Vec<String> = names
                .iter()
                .map(|(pkg, in_files)| format!("{pkg} ({})", in_files.join(", ")))
                .collect();
            messages.push(format!("found packages {} in {dir}", found.join(" and ")));
        }
        let package = names.keys().next().map_or(fallback, |p| (*p).to_string());

        if files.is_empty() && messages.is_empty() {
            return Err(ExtractError::NoSourceFilesFound { dir });
        }

        let scope = PackageScope::new(&files);
        if messages.is_empty() {
            messages = scope.check();
        }
        if !messages.is_empty() {
            debug!(count = messages.len(), "package has errors");
            return Err(ExtractError::PackageErrors { package, messages });
        }

        let mut contract = ContractBuilder::new(&self.options, &scope).build(&package, &files);
        if let Some(module) = GoModule::find(&dir)? {
            contract.module_path = module.import_path(&dir).unwrap_or_default();
        }
        Ok(contract)
    }
}
