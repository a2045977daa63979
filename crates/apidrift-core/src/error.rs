//! Configuration errors and the failure classes shared by every module.

use thiserror::Error;

use crate::contract::ContractIoError;
use crate::diff::DiffError;
use crate::extract::ExtractError;
use crate::git::GitError;
use crate::vcs::VcsError;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Broad class of a failure, independent of the module that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something that cannot exist: a missing contract,
    /// an empty package pattern, a malformed regular expression.
    Input,
    /// Source code does not parse or does not type-check.
    ParseOrCompile,
    /// Reading or writing the filesystem failed.
    Io,
    /// A named reference does not exist.
    NotFound,
    /// An external tool failed or timed out.
    Operational,
}

impl ErrorKind {
    /// Short lowercase label for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::ParseOrCompile => "parse",
            Self::Io => "io",
            Self::NotFound => "not-found",
            Self::Operational => "operational",
        }
    }
}

impl ExtractError {
    /// Failure class of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoPackagesFound { .. } | Self::NoSourceFilesFound { .. } => ErrorKind::Input,
            Self::Parse { .. } | Self::PackageErrors { .. } => ErrorKind::ParseOrCompile,
            Self::Io { .. } => ErrorKind::Io,
            Self::Grammar(_) => ErrorKind::Operational,
        }
    }
}

impl DiffError {
    /// Failure class of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingContract { .. } => ErrorKind::Input,
        }
    }
}

impl ContractIoError {
    /// Failure class of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Json { .. } => ErrorKind::Input,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Read { .. } | Self::Write { .. } => ErrorKind::Io,
        }
    }
}

impl GitError {
    /// Failure class of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotARepo => ErrorKind::Input,
            Self::Exec(_) | Self::Command { .. } | Self::Timeout { .. } | Self::GitNotFound => {
                ErrorKind::Operational
            }
        }
    }
}

impl VcsError {
    /// Failure class of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPattern { .. } => ErrorKind::Input,
            Self::RefNotFound { .. } => ErrorKind::NotFound,
            Self::Materialize { .. } => ErrorKind::Operational,
            Self::Workspace(_) => ErrorKind::Io,
            Self::Git(e) => e.kind(),
            Self::Extract(e) => e.kind(),
        }
    }
}

/// Find the failure class of the first library error in a chain.
pub fn classify(err: &(dyn std::error::Error + 'static)) -> Option<ErrorKind> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(e) = e.downcast_ref::<ExtractError>() {
            return Some(e.kind());
        }
        if let Some(e) = e.downcast_ref::<VcsError>() {
            return Some(e.kind());
        }
        if let Some(e) = e.downcast_ref::<DiffError>() {
            return Some(e.kind());
        }
        if let Some(e) = e.downcast_ref::<ContractIoError>() {
            return Some(e.kind());
        }
        if let Some(e) = e.downcast_ref::<GitError>() {
            return Some(e.kind());
        }
        current = e.source();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Side;

    #[test]
    fn classifies_nested_errors() {
        let vcs = VcsError::Extract(ExtractError::NoPackagesFound {
            target: "./...".into(),
        });
        assert_eq!(vcs.kind(), ErrorKind::Input);
        assert_eq!(classify(&vcs), Some(ErrorKind::Input));

        let missing = VcsError::RefNotFound {
            reference: "v9".into(),
        };
        assert_eq!(classify(&missing), Some(ErrorKind::NotFound));

        let diff = DiffError::MissingContract { side: Side::New };
        assert_eq!(classify(&diff).map(ErrorKind::as_str), Some("input"));

        let config = ConfigError::Deserialize(Box::new(figment::Error::from("bad".to_string())));
        assert_eq!(classify(&config), None);
    }
}
