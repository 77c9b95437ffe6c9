//! Package fetching
//!
//! - `fetcher`: the `ContentFetcher` capability and registry helpers
//! - `coordinator`: single-flight deduplication of concurrent fetches

pub mod coordinator;
pub mod fetcher;

pub use coordinator::{CoordinatorStats, FetchCoordinator};
pub use fetcher::{
    is_valid_registry_url, package_url, ContentFetcher, PackageContent, PackageFile,
    StaticFetcher, DEFAULT_REGISTRY,
};
