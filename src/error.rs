//! Error taxonomy for package resolution and activation.
//!
//! Only conditions that can never be retried are represented as errors.
//! Discovery failures ("no such package on the search path") surface as
//! `Ok(None)` plus a single logged warning, because symbol resolution must
//! be able to retry after more packages activate and register new rules.

use std::path::PathBuf;

/// Result type for loader operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors that can occur during package resolution and activation.
#[derive(Debug, Clone)]
pub enum LoadError {
    /// A package expression lacked the required `@` delimiter.
    MalformedPackageName(String),
    /// A package declared autoload rules without a base directory to
    /// anchor them to.
    ActivationContract(String),
    /// The host failed to execute a loadable unit.
    Exec(PathBuf, String),
    /// A declarative metadata document could not be parsed.
    Manifest(PathBuf, String),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::MalformedPackageName(expr) => {
                write!(f, "Malformed package name: {}", expr)
            }
            LoadError::ActivationContract(msg) => {
                write!(f, "Activation contract violation: {}", msg)
            }
            LoadError::Exec(file, err) => {
                write!(f, "Failed to execute '{}': {}", file.display(), err)
            }
            LoadError::Manifest(file, err) => {
                write!(f, "Failed to parse '{}': {}", file.display(), err)
            }
        }
    }
}

impl std::error::Error for LoadError {}
