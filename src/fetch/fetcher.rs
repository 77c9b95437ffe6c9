//! Content fetcher abstraction and registry helpers

use crate::error::FetchError;
use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Default package registry
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Registry URL shape: optional http(s) scheme, a domain, IPv4 address or
/// `localhost`, then optional port/path/query segments
static REGISTRY_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?([\da-z.-]+\.[a-z.]{2,6}|[\d.]+|localhost)([/:?=&#][\da-z.-]+)*[/?]?$")
        .expect("Invalid REGISTRY_URL_RE regex")
});

/// Check whether `url` is an acceptable registry URL
pub fn is_valid_registry_url(url: &str) -> bool {
    REGISTRY_URL_RE.is_match(url)
}

/// Build the metadata URL of a package version: `<registry>/<name>/<version>`
pub fn package_url(registry: &str, name: &str, version: &str) -> String {
    format!("{}/{}/{}", registry.trim_end_matches('/'), name, version)
}

/// One file of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    /// Path relative to the package root
    pub path: String,

    /// File contents
    pub content: Bytes,
}

impl PackageFile {
    /// Create a new package file
    pub fn new(path: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Files of a package in archive order
pub type PackageContent = Vec<PackageFile>;

/// Source of package content
///
/// Implementations own registry access: URL construction, download,
/// decompression and archive extraction. The loader only relies on this
/// returning the package's files in order, or failing.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch all files of `name@version`
    async fn fetch(&self, name: &str, version: &str) -> Result<PackageContent, FetchError>;
}

/// Fetcher serving packages from memory
///
/// Useful as an offline mirror and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    packages: HashMap<String, PackageContent>,
}

impl StaticFetcher {
    /// Create an empty fetcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a package
    pub fn with_package(mut self, name: &str, version: &str, files: PackageContent) -> Self {
        self.insert(name, version, files);
        self
    }

    /// Add or replace a package
    pub fn insert(&mut self, name: &str, version: &str, files: PackageContent) {
        self.packages.insert(format!("{}@{}", name, version), files);
    }

    /// Number of known packages
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether no packages are known
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[async_trait]
impl ContentFetcher for StaticFetcher {
    async fn fetch(&self, name: &str, version: &str) -> Result<PackageContent, FetchError> {
        let package = format!("{}@{}", name, version);
        self.packages
            .get(&package)
            .cloned()
            .ok_or(FetchError::PackageNotFound { package })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_registry_urls() {
        assert!(is_valid_registry_url(DEFAULT_REGISTRY));
        assert!(is_valid_registry_url("registry.npmjs.org"));
        assert!(is_valid_registry_url("http://localhost:4873"));
        assert!(is_valid_registry_url("http://127.0.0.1:4873/"));
        assert!(is_valid_registry_url("https://npm.example.com/registry"));
    }

    #[test]
    fn test_invalid_registry_urls() {
        assert!(!is_valid_registry_url(""));
        assert!(!is_valid_registry_url("not a url"));
        assert!(!is_valid_registry_url("ftp://registry.npmjs.org"));
        assert!(!is_valid_registry_url("https://"));
    }

    #[test]
    fn test_package_url() {
        assert_eq!(
            package_url(DEFAULT_REGISTRY, "react", "18.2.0"),
            "https://registry.npmjs.org/react/18.2.0"
        );
        assert_eq!(
            package_url("http://localhost:4873/", "ama", "1.0.0"),
            "http://localhost:4873/ama/1.0.0"
        );
    }

    #[tokio::test]
    async fn test_static_fetcher() {
        let fetcher = StaticFetcher::new().with_package(
            "ama",
            "1.0.0",
            vec![PackageFile::new("index.js", "console.log(1)")],
        );
        assert_eq!(fetcher.len(), 1);

        let content = fetcher.fetch("ama", "1.0.0").await.unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0].path, "index.js");
        assert_eq!(content[0].content, Bytes::from("console.log(1)"));

        let missing = fetcher.fetch("ama", "2.0.0").await;
        assert_eq!(
            missing,
            Err(FetchError::PackageNotFound {
                package: "ama@2.0.0".to_string()
            })
        );
    }
}
