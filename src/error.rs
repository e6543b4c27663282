//! Binding Errors
//!
//! Error taxonomy for resolving and loading native bindings.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config::ConfigError;
use crate::platform::PlatformError;

/// Result type for binding operations.
pub type BindingResult<T> = Result<T, BindingError>;

/// Errors surfaced by the resolver and loader.
#[derive(Debug, Clone, Error)]
pub enum BindingError {
    /// Malformed request (empty names, separators in the binding name).
    #[error("Invalid binding request: {0}")]
    InvalidRequest(String),

    /// The host OS/architecture has no binary naming.
    #[error(transparent)]
    UnsupportedPlatform(#[from] PlatformError),

    /// No candidate file exists on disk.
    #[error(
        "Cannot find native binding for '{package}'. Searched:{}",
        PathList(.searched)
    )]
    BindingNotFound {
        package: String,
        searched: Vec<PathBuf>,
    },

    /// Candidate files exist but none of them loaded.
    #[error(
        "Failed to load native binding for '{package}':{}",
        FailureList(.failures)
    )]
    AllCandidatesFailed {
        package: String,
        /// Every candidate probed, in order, including the missing ones
        searched: Vec<PathBuf>,
        failures: Vec<CandidateFailure>,
    },

    /// A loaded binding does not export the requested symbol.
    #[error("Symbol '{symbol}' not found in '{}': {message}", .path.display())]
    SymbolNotFound {
        symbol: String,
        path: PathBuf,
        message: String,
    },

    /// Package descriptor could not be read or parsed.
    #[error("Failed to read package descriptor {}: {message}", .path.display())]
    Descriptor { path: PathBuf, message: String },

    /// `bindload.toml` exists but could not be read or is invalid.
    #[error("Invalid loader configuration: {0}")]
    Config(Arc<ConfigError>),
}

impl From<ConfigError> for BindingError {
    fn from(err: ConfigError) -> Self {
        BindingError::Config(Arc::new(err))
    }
}

impl BindingError {
    /// Paths that were probed, when the error came from a search.
    pub fn searched_paths(&self) -> Vec<&PathBuf> {
        match self {
            BindingError::BindingNotFound { searched, .. }
            | BindingError::AllCandidatesFailed { searched, .. } => searched.iter().collect(),
            _ => Vec::new(),
        }
    }
}

/// Why an existing candidate failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Wrong architecture, ABI or object format.
    Incompatible,
    /// Missing shared-library dependency, missing symbol, or any other loader error.
    Link,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Incompatible => write!(f, "incompatible"),
            FailureKind::Link => write!(f, "link error"),
        }
    }
}

/// A candidate that existed on disk but could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

impl CandidateFailure {
    pub fn new(path: impl Into<PathBuf>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.path.display(), self.kind, self.message)
    }
}

struct PathList<'a>(&'a [PathBuf]);

impl fmt::Display for PathList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for path in self.0 {
            write!(f, "\n  - {}", path.display())?;
        }
        Ok(())
    }
}

struct FailureList<'a>(&'a [CandidateFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for failure in self.0 {
            write!(f, "\n  - {}", failure)?;
        }
        Ok(())
    }
}
