//! Core library for apidrift.
//!
//! Extracts the exported API surface of a Go package into a [`Contract`],
//! compares two contracts into a [`ContractDiff`] that separates breaking
//! changes from additions and modifications, and materializes historical
//! references of a git repository so any two versions can be compared.
//!
//! # Modules
//!
//! - [`contract`] - Contract and diff data model, JSON persistence
//! - [`syntax`] - Go source parsing into declarations
//! - [`extract`] - Resolved and syntax-only extraction strategies
//! - [`diff`] - Contract comparison
//! - [`git`] - Deadline-aware git subprocesses
//! - [`vcs`] - Contracts at branches, tags, and commits
//! - [`config`] - Configuration loading and management
//! - [`error`] - Configuration errors and failure classes
//!
//! # Quick Start
//!
//! ```no_run
//! use apidrift_core::{ContractSource, Differ, ExtractOptions, PackageExtractor};
//! use camino::Utf8Path;
//!
//! let extractor = PackageExtractor::new(ExtractOptions::default());
//! let old = extractor.extract(Utf8Path::new("old/pkg/client")).expect("old contract");
//! let new = extractor.extract(Utf8Path::new("pkg/client")).expect("new contract");
//!
//! let diff = Differ::default().diff(&old, &new);
//! println!("{} breaking change(s)", diff.summary.total_breaking_changes);
//! ```
#![deny(unsafe_code)]

pub mod config;

pub mod contract;

pub mod diff;

pub mod error;

pub mod extract;

pub mod git;

pub mod syntax;

pub mod vcs;

pub use config::{Config, ConfigLoader, LogLevel};

pub use contract::{Change, ChangeType, Contract, ContractDiff, DiffSummary};

pub use diff::{DiffError, DiffOptions, Differ};

pub use error::{ConfigError, ConfigResult, ErrorKind};

pub use extract::{
    ContractSource, DirectoryExtractor, ExtractError, ExtractOptions, PackageExtractor, Strategy,
};

pub use vcs::{VcsAdapter, VcsError, VcsOptions};
