//! JSON persistence for contracts and diffs.
//!
//! Files are written as indented JSON with empty collections omitted, so that
//! two contract files can be reviewed with an ordinary text diff.

use std::io::ErrorKind;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use super::{Contract, ContractDiff};

/// Errors from reading or writing persisted contracts.
#[derive(Error, Debug)]
pub enum ContractIoError {
    /// The file does not exist.
    #[error("contract file not found: {path}")]
    NotFound {
        /// Requested path.
        path: Utf8PathBuf,
    },

    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The content is not valid contract JSON.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// File that failed.
        path: Utf8PathBuf,
        /// Parser error.
        source: serde_json::Error,
    },
}

/// Result alias for contract persistence.
pub type ContractIoResult<T> = Result<T, ContractIoError>;

impl Contract {
    /// Load a contract previously written with [`Contract::write_to`].
    pub fn read_from(path: &Utf8Path) -> ContractIoResult<Self> {
        read_json(path)
    }

    /// Write the contract as indented JSON.
    pub fn write_to(&self, path: &Utf8Path) -> ContractIoResult<()> {
        write_json(path, self)
    }

    /// Render the contract as indented JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl ContractDiff {
    /// Load a diff previously written with [`ContractDiff::write_to`].
    pub fn read_from(path: &Utf8Path) -> ContractIoResult<Self> {
        read_json(path)
    }

    /// Write the diff as indented JSON.
    pub fn write_to(&self, path: &Utf8Path) -> ContractIoResult<()> {
        write_json(path, self)
    }
}

#[instrument(level = "debug", fields(%path))]
fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> ContractIoResult<T> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            ContractIoError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ContractIoError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    debug!(bytes = text.len(), "read JSON file");
    serde_json::from_str(&text).map_err(|source| ContractIoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[instrument(level = "debug", skip(value), fields(%path))]
fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> ContractIoResult<()> {
    let mut text = serde_json::to_string_pretty(value).map_err(|source| ContractIoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    text.push('\n');

    if let Some(parent) = path.parent()
        && !parent.as_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| ContractIoError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, text).map_err(|source| ContractIoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::tests::sample;
    use tempfile::TempDir;

    fn utf8(tmp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("tempdir is UTF-8")
    }

    #[test]
    fn contract_round_trips_through_file() {
        let tmp = TempDir::new().unwrap();
        let path = utf8(&tmp).join("nested").join("v1.json");

        let original = sample();
        original.write_to(&path).unwrap();
        let loaded = Contract::read_from(&path).unwrap();

        assert!(original.same_surface(&loaded));
        assert_eq!(original.version, loaded.version);
    }

    #[test]
    fn empty_collections_are_omitted() {
        let c = Contract::new("empty");
        let json = c.to_json().unwrap();
        assert!(!json.contains("interfaces"));
        assert!(!json.contains("constants"));
        assert!(json.contains("\"package_name\": \"empty\""));
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = Contract::read_from(&utf8(&tmp).join("nope.json")).unwrap_err();
        assert!(matches!(err, ContractIoError::NotFound { .. }));
    }

    #[test]
    fn garbage_is_a_json_error() {
        let tmp = TempDir::new().unwrap();
        let path = utf8(&tmp).join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Contract::read_from(&path).unwrap_err();
        assert!(matches!(err, ContractIoError::Json { .. }));
    }
}
