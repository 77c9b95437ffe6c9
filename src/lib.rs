//! # pkgcache
//!
//! An in-memory cache of package content for services that serve individual
//! files out of registry packages.
//!
//! ## Features
//!
//! - Include/exclude admission policy with exact or regex patterns
//! - Sliding idle expiry driven by a single background sweeper
//! - Single-flight loading: concurrent requests for the same package share
//!   one fetch
//! - Failed loads are never cached, so the next request retries
//! - Pluggable `ContentFetcher` and `ContentStore` implementations
//!
//! ## Loading Assets
//!
//! ```no_run
//! use pkgcache::{LoaderConfig, PackageFile, PackageLoader, StaticFetcher};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = StaticFetcher::new().with_package(
//!         "ama",
//!         "1.0.0",
//!         vec![PackageFile::new("index.js", "export default 1;")],
//!     );
//!
//!     let config = LoaderConfig::builder()
//!         .ttl(Duration::from_secs(600))
//!         .build();
//!     let loader = PackageLoader::new(config, Arc::new(fetcher))?;
//!
//!     if let Some(source) = loader.get_asset("ama", "1.0.0", "index.js").await? {
//!         println!("{}", String::from_utf8_lossy(&source));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Admission Policy
//!
//! A package is loadable when it matches an include specifier (or no include
//! list is configured) and matches no exclude specifier.
//!
//! ```no_run
//! use pkgcache::{AdmissionPolicy, PackageSpecifier, Pattern};
//!
//! fn main() -> anyhow::Result<()> {
//!     let policy = AdmissionPolicy::new(
//!         Some(vec![PackageSpecifier::name(Pattern::regex("^@acme/")?)]),
//!         Some(vec![PackageSpecifier::name("@acme/internal")]),
//!     );
//!
//!     assert!(policy.is_allowed("@acme/ui", "2.1.0"));
//!     assert!(!policy.is_allowed("left-pad", "1.3.0"));
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration From Environment
//!
//! ```no_run
//! use pkgcache::{LoaderConfig, PackageLoader, StaticFetcher};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // PKGCACHE_REGISTRY, PKGCACHE_TTL_MS, PKGCACHE_FETCH_TIMEOUT_MS
//!     let config = LoaderConfig::from_env()?;
//!     let loader = PackageLoader::new(config, Arc::new(StaticFetcher::new()))?;
//!     println!("{}", loader.package_url("react", "18.2.0"));
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod content;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod policy;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheEntry, CacheMetadata, CacheStats, ExpiringCache,
    InvalidationEvent, InvalidationReason,
};
pub use content::{memory_store_factory, ContentStore, MemoryStore, StoreFactory};
pub use error::{FetchError, LoaderError, Result};
pub use fetch::{
    ContentFetcher, CoordinatorStats, FetchCoordinator, PackageContent, PackageFile,
    StaticFetcher, DEFAULT_REGISTRY,
};
pub use loader::{LoaderConfig, LoaderConfigBuilder, PackageKey, PackageLoader};
pub use policy::{is_matched, AdmissionPolicy, PackageSpecifier, Pattern};
