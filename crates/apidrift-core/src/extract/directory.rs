//! Syntax-only extraction.

use camino::Utf8Path;
use tracing::{debug, instrument};

use super::builder::{ContractBuilder, Syntactic};
use super::module::GoModule;
use super::{ContractSource, ExtractError, ExtractOptions, ExtractResult, read_sources};
use crate::contract::Contract;
use crate::syntax::GoParser;

/// Extracts a contract from the `.go` files of one directory without
/// resolving names across declarations.
///
/// Useful when the package does not compile on its own, for example a
/// historical checkout whose dependencies are unavailable.
#[derive(Debug, Clone, Default)]
pub struct DirectoryExtractor {
    options: ExtractOptions,
}

impl DirectoryExtractor {
    /// Create an extractor with the given filters.
    pub const fn new(options: ExtractOptions) -> Self {
        Self { options }
    }
}

impl ContractSource for DirectoryExtractor {
    #[instrument(skip(self), fields(%dir))]
    fn extract(&self, dir: &Utf8Path) -> ExtractResult<Contract> {
        let sources = read_sources(dir, &self.options)?;
        let mut parser = GoParser::new()?;

        let mut files = Vec::with_capacity(sources.len());
        for source in &sources {
            let file = parser.parse(&source.name, &source.text).map_err(|errors| {
                let first = errors.into_iter().next();
                ExtractError::Parse {
                    file: dir.join(&source.name),
                    line: first.as_ref().map_or(1, |e| e.line),
                    column: first.as_ref().map_or(1, |e| e.column),
                    message: first.map_or_else(|| "syntax error".into(), |e| e.message),
                }
            })?;
            if file.package.ends_with("_test") {
                debug!(file = %file.name, "skipped");
                continue;
            }
            files.push(file);
        }

        let Some(package) = files.first().map(|f| f.package.clone()) else {
            return Err(ExtractError::NoSourceFilesFound {
                dir: dir.to_path_buf(),
            });
        };

        let mut contract = ContractBuilder::new(&self.options, &Syntactic).build(&package, &files);
        if let Ok(abs) = dir.canonicalize_utf8()
            && let Some(module) = GoModule::find(&abs)?
        {
            contract.module_path = module.import_path(&abs).unwrap_or_default();
        }
        Ok(contract)
    }
}
