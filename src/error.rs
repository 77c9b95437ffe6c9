//! Error types for package loading
//!
//! This module defines the error types surfaced by `PackageLoader` and its
//! collaborators. Errors are `Clone` because a single failed fetch is
//! handed to every caller that was waiting on it.

use thiserror::Error;

/// Main error type for package loading operations
#[derive(Error, Debug, Clone)]
pub enum LoaderError {
    /// The admission policy rejected the package
    #[error("The package \"{name}@{version}\" is restricted to load")]
    RestrictedPackage { name: String, version: String },

    /// The content fetcher failed
    #[error("Fetch failed: {0}")]
    FetchFailure(#[from] FetchError),

    /// The fetch did not settle within the configured timeout
    #[error("Fetch of {package} timed out after {timeout_ms}ms")]
    FetchTimeout { package: String, timeout_ms: u64 },

    /// The fetch task panicked or was cancelled by the runtime
    #[error("Fetch aborted: {0}")]
    FetchAborted(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Errors reported by a `ContentFetcher`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network or registry transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// The registry does not know the requested package
    #[error("Package not found: {package}")]
    PackageNotFound { package: String },

    /// The package archive could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Any other fetcher failure
    #[error("{0}")]
    Other(String),
}

/// Result type alias for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

impl From<String> for LoaderError {
    fn from(s: String) -> Self {
        LoaderError::Other(s)
    }
}

impl From<&str> for LoaderError {
    fn from(s: &str) -> Self {
        LoaderError::Other(s.to_string())
    }
}

impl From<tokio::task::JoinError> for LoaderError {
    fn from(err: tokio::task::JoinError) -> Self {
        LoaderError::FetchAborted(err.to_string())
    }
}

impl LoaderError {
    /// Whether this error came from the admission policy
    pub fn is_restricted(&self) -> bool {
        matches!(self, LoaderError::RestrictedPackage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = LoaderError::RestrictedPackage {
            name: "left-pad".to_string(),
            version: "1.0.0".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "The package \"left-pad@1.0.0\" is restricted to load"
        );

        let timeout_error = LoaderError::FetchTimeout {
            package: "ama@1.0.0".to_string(),
            timeout_ms: 250,
        };
        assert!(timeout_error.to_string().contains("timed out after 250ms"));

        let fetch_error: LoaderError = FetchError::PackageNotFound {
            package: "ghost@0.0.1".to_string(),
        }
        .into();
        assert!(fetch_error.to_string().contains("ghost@0.0.1"));
    }

    #[test]
    fn test_error_conversion() {
        let error: LoaderError = "test error".into();
        assert!(matches!(error, LoaderError::Other(_)));

        let error: LoaderError = "test error".to_string().into();
        assert!(matches!(error, LoaderError::Other(_)));

        let error: LoaderError = FetchError::Network("reset".to_string()).into();
        assert!(matches!(error, LoaderError::FetchFailure(FetchError::Network(_))));
        assert!(!error.is_restricted());
    }
}
