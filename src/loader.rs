//! Package loading with admission control, caching and fetch deduplication
//!
//! `PackageLoader` is the main entry point. It checks the admission policy,
//! serves package files from an idle-expiring cache, and on a miss runs a
//! single deduplicated fetch per package through the configured
//! `ContentFetcher`.

use crate::cache::{CacheConfig, CacheStats, ExpiringCache};
use crate::content::{memory_store_factory, ContentStore, StoreFactory};
use crate::error::{LoaderError, Result};
use crate::fetch::{
    is_valid_registry_url, package_url, ContentFetcher, CoordinatorStats, FetchCoordinator,
    PackageContent, DEFAULT_REGISTRY,
};
use crate::policy::{AdmissionPolicy, PackageSpecifier};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identity of a package version
///
/// Two keys are equal when their canonical `name@version` forms are equal.
/// Versions are compared as plain strings.
#[derive(Clone)]
pub struct PackageKey {
    id: String,
    name_len: usize,
}

impl PackageKey {
    /// Create a key for `name@version`
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            id: format!("{}@{}", name, version),
            name_len: name.len(),
        }
    }

    /// Package name
    pub fn name(&self) -> &str {
        &self.id[..self.name_len]
    }

    /// Package version
    pub fn version(&self) -> &str {
        &self.id[self.name_len + 1..]
    }

    /// Canonical `name@version` form
    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl PartialEq for PackageKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PackageKey {}

impl Hash for PackageKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl fmt::Debug for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PackageKey").field(&self.id).finish()
    }
}

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_string()
}

/// Configuration for a `PackageLoader`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Registry URL to fetch package content from
    #[serde(default = "default_registry")]
    pub registry: String,

    /// Expiry settings for loaded packages
    #[serde(default)]
    pub cache: CacheConfig,

    /// Include/exclude lists
    #[serde(flatten)]
    pub policy: AdmissionPolicy,

    /// Upper bound for a single fetch; `None` waits indefinitely
    #[serde(default)]
    pub fetch_timeout: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            cache: CacheConfig::default(),
            policy: AdmissionPolicy::default(),
            fetch_timeout: None,
        }
    }
}

impl LoaderConfig {
    /// Create a new builder for loader configuration
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::default()
    }

    /// Read configuration from the environment
    ///
    /// - `PKGCACHE_REGISTRY`: registry URL
    /// - `PKGCACHE_TTL_MS`: idle TTL in milliseconds, `0` or `off` disables expiry
    /// - `PKGCACHE_FETCH_TIMEOUT_MS`: fetch timeout in milliseconds
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Ok(registry) = std::env::var("PKGCACHE_REGISTRY") {
            builder = builder.registry(registry);
        }

        if let Ok(ttl) = std::env::var("PKGCACHE_TTL_MS") {
            builder = match parse_ttl_ms(&ttl)? {
                Some(ttl) => builder.ttl(ttl),
                None => builder.disable_ttl(),
            };
        }

        if let Ok(timeout) = std::env::var("PKGCACHE_FETCH_TIMEOUT_MS") {
            let millis = timeout.trim().parse::<u64>().map_err(|e| {
                LoaderError::ConfigError(format!(
                    "PKGCACHE_FETCH_TIMEOUT_MS must be a number of milliseconds: {}",
                    e
                ))
            })?;
            builder = builder.fetch_timeout(Duration::from_millis(millis));
        }

        let config = builder.build();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_valid_registry_url(&self.registry) {
            return Err(LoaderError::ConfigError(format!(
                "Invalid registry URL: {}",
                self.registry
            )));
        }

        self.cache.validate().map_err(LoaderError::ConfigError)?;

        if self.fetch_timeout.map_or(false, |t| t.is_zero()) {
            return Err(LoaderError::ConfigError(
                "fetch_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse a TTL given in milliseconds; `0`, `off` and `false` disable expiry
fn parse_ttl_ms(value: &str) -> Result<Option<Duration>> {
    match value.trim().to_lowercase().as_str() {
        "0" | "off" | "false" => Ok(None),
        other => other
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| {
                LoaderError::ConfigError(format!(
                    "PKGCACHE_TTL_MS must be a number of milliseconds or \"off\": {}",
                    e
                ))
            }),
    }
}

/// Builder for loader configuration
#[derive(Debug, Default)]
pub struct LoaderConfigBuilder {
    registry: Option<String>,
    cache: Option<CacheConfig>,
    ttl: Option<Option<Duration>>,
    include: Option<Vec<PackageSpecifier>>,
    exclude: Option<Vec<PackageSpecifier>>,
    fetch_timeout: Option<Duration>,
}

impl LoaderConfigBuilder {
    /// Set the registry URL
    pub fn registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Replace the whole cache configuration
    pub fn cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the idle TTL for loaded packages
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(Some(ttl));
        self
    }

    /// Keep loaded packages until explicitly evicted
    pub fn disable_ttl(mut self) -> Self {
        self.ttl = Some(None);
        self
    }

    /// Only load packages matching one of these specifiers
    pub fn include(mut self, specifiers: Vec<PackageSpecifier>) -> Self {
        self.include = Some(specifiers);
        self
    }

    /// Never load packages matching one of these specifiers
    pub fn exclude(mut self, specifiers: Vec<PackageSpecifier>) -> Self {
        self.exclude = Some(specifiers);
        self
    }

    /// Fail fetches that take longer than `timeout`
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Build the loader configuration
    pub fn build(self) -> LoaderConfig {
        let defaults = LoaderConfig::default();

        let mut cache = self.cache.unwrap_or(defaults.cache);
        if let Some(ttl) = self.ttl {
            cache.ttl = ttl;
        }

        LoaderConfig {
            registry: self.registry.unwrap_or(defaults.registry),
            cache,
            policy: AdmissionPolicy::new(self.include, self.exclude),
            fetch_timeout: self.fetch_timeout,
        }
    }
}

/// Loads package files on demand
///
/// Each package version is fetched at most once at a time, kept in memory
/// while it is being used, and dropped after sitting idle for the configured
/// TTL. Concurrent requests for a package that is not cached share a single
/// fetch.
pub struct PackageLoader {
    config: LoaderConfig,
    fetcher: Arc<dyn ContentFetcher>,
    storage: Arc<ExpiringCache<PackageKey, Arc<dyn ContentStore>>>,
    loaders: FetchCoordinator<PackageKey, Arc<dyn ContentStore>, LoaderError>,
    store_factory: StoreFactory,
}

impl PackageLoader {
    /// Create a loader, validating the configuration first
    pub fn new(config: LoaderConfig, fetcher: Arc<dyn ContentFetcher>) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing package loader (registry: {}, ttl: {:?})",
            config.registry, config.cache.ttl
        );

        Ok(Self {
            storage: Arc::new(ExpiringCache::new(config.cache.clone())),
            loaders: FetchCoordinator::new(),
            store_factory: memory_store_factory(),
            config,
            fetcher,
        })
    }

    /// Use a custom store implementation for loaded packages
    pub fn with_store_factory(mut self, factory: StoreFactory) -> Self {
        self.store_factory = factory;
        self
    }

    /// Get the loader configuration
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Read one file of a package, loading the package if needed
    ///
    /// Returns `Ok(None)` when the package exists but has no file at
    /// `asset_path`.
    ///
    /// # Errors
    ///
    /// - `RestrictedPackage` if the admission policy rejects the package;
    ///   nothing is fetched or cached in that case
    /// - `FetchFailure`, `FetchTimeout` or `FetchAborted` if loading fails;
    ///   the next call retries
    pub async fn get_asset(
        &self,
        name: &str,
        version: &str,
        asset_path: &str,
    ) -> Result<Option<Bytes>> {
        let key = PackageKey::new(name, version);
        self.ensure_allowed(&key)?;

        let store = match self.storage.get(&key).await {
            Some(store) => store,
            None => self.load(key.clone()).await?,
        };

        let asset = store.read(asset_path);
        if asset.is_none() {
            debug!("Asset {} not found in {}", asset_path, key);
        }
        Ok(asset)
    }

    /// Fetch a package's content directly, bypassing the cache
    pub async fn fetch_package_content(&self, name: &str, version: &str) -> Result<PackageContent> {
        let key = PackageKey::new(name, version);
        self.ensure_allowed(&key)?;
        fetch_with_timeout(self.fetcher.as_ref(), &key, self.config.fetch_timeout).await
    }

    /// Determine if a package may be loaded
    pub fn is_allowed(&self, name: &str, version: &str) -> bool {
        self.config.policy.is_allowed(name, version)
    }

    /// Registry metadata URL of a package version
    pub fn package_url(&self, name: &str, version: &str) -> String {
        package_url(&self.config.registry, name, version)
    }

    /// Whether a fetch for the package is currently running
    pub fn is_loading(&self, name: &str, version: &str) -> bool {
        self.loaders.is_in_flight(&PackageKey::new(name, version))
    }

    /// Drop a cached package; returns whether it was cached
    pub async fn evict(&self, name: &str, version: &str) -> bool {
        let key = PackageKey::new(name, version);
        let removed = self.storage.remove(&key).await.is_some();
        if removed {
            debug!("Evicted {}", key);
        }
        removed
    }

    /// Drop every cached package
    pub async fn clear(&self) {
        self.storage.clear().await;
    }

    /// Packages currently held in memory
    pub async fn cached_packages(&self) -> Vec<PackageKey> {
        self.storage.keys().await
    }

    /// Get cache statistics
    pub async fn cache_stats(&self) -> CacheStats {
        self.storage.stats().await
    }

    /// Get fetch deduplication statistics
    pub fn coordinator_stats(&self) -> CoordinatorStats {
        self.loaders.stats()
    }

    fn ensure_allowed(&self, key: &PackageKey) -> Result<()> {
        if self.is_allowed(key.name(), key.version()) {
            return Ok(());
        }

        warn!("Rejected restricted package {}", key);
        Err(LoaderError::RestrictedPackage {
            name: key.name().to_string(),
            version: key.version().to_string(),
        })
    }

    /// Fetch, populate and cache a package through the single-flight
    /// coordinator
    async fn load(&self, key: PackageKey) -> Result<Arc<dyn ContentStore>> {
        let fetcher = Arc::clone(&self.fetcher);
        let storage = Arc::clone(&self.storage);
        let factory = Arc::clone(&self.store_factory);
        let timeout = self.config.fetch_timeout;
        let task_key = key.clone();

        self.loaders
            .run_once(key, move || async move {
                // A fetch for this key may have settled between the cache
                // miss and this fetch being registered
                if let Some(store) = storage.peek(&task_key).await {
                    return Ok(store);
                }

                let content = fetch_with_timeout(fetcher.as_ref(), &task_key, timeout).await?;
                let file_count = content.len();

                let mut store = factory();
                for file in content {
                    store.write(&file.path, file.content);
                }
                store.commit();

                let store: Arc<dyn ContentStore> = Arc::from(store);
                storage.set(task_key.clone(), Arc::clone(&store)).await;

                info!("Loaded {} ({} files)", task_key, file_count);
                Ok(store)
            })
            .await
    }
}

async fn fetch_with_timeout(
    fetcher: &dyn ContentFetcher,
    key: &PackageKey,
    timeout: Option<Duration>,
) -> Result<PackageContent> {
    debug!("Fetching {}", key);
    let fetch = fetcher.fetch(key.name(), key.version());

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, fetch).await {
            Ok(result) => result.map_err(LoaderError::from),
            Err(_) => Err(LoaderError::FetchTimeout {
                package: key.to_string(),
                timeout_ms: limit.as_millis() as u64,
            }),
        },
        None => fetch.await.map_err(LoaderError::from),
    };

    if let Err(e) = &result {
        warn!("Failed to fetch {}: {}", key, e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;
    use crate::policy::Pattern;
    use std::collections::HashSet;

    #[test]
    fn test_package_key() {
        let key = PackageKey::new("@scope/ui", "1.0.0-beta.1");
        assert_eq!(key.name(), "@scope/ui");
        assert_eq!(key.version(), "1.0.0-beta.1");
        assert_eq!(key.to_string(), "@scope/ui@1.0.0-beta.1");
        assert_eq!(key.as_str(), "@scope/ui@1.0.0-beta.1");
    }

    #[test]
    fn test_package_key_equality_uses_canonical_form() {
        assert_eq!(PackageKey::new("a@b", "c"), PackageKey::new("a", "b@c"));
        assert_ne!(PackageKey::new("foo", "1.0"), PackageKey::new("foo", "1.0.0"));

        let keys: HashSet<_> = [PackageKey::new("a@b", "c"), PackageKey::new("a", "b@c")]
            .into_iter()
            .collect();
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.registry, DEFAULT_REGISTRY);
        assert_eq!(config.cache.ttl, Some(Duration::from_secs(3600)));
        assert!(config.policy.is_unrestricted());
        assert!(config.fetch_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = LoaderConfig::builder()
            .registry("http://localhost:4873")
            .ttl(Duration::from_millis(1000))
            .include(vec![PackageSpecifier::name(Pattern::regex("^@scope/").unwrap())])
            .exclude(vec![PackageSpecifier::name("@scope/internal")])
            .fetch_timeout(Duration::from_secs(30))
            .build();

        assert_eq!(config.registry, "http://localhost:4873");
        assert_eq!(config.cache.ttl, Some(Duration::from_millis(1000)));
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(30)));
        assert!(config.policy.is_allowed("@scope/ui", "1.0.0"));
        assert!(!config.policy.is_allowed("@scope/internal", "1.0.0"));

        let config = LoaderConfig::builder().disable_ttl().build();
        assert_eq!(config.cache.ttl, None);
    }

    #[test]
    fn test_config_validation() {
        let invalid = LoaderConfig::builder().registry("not a url").build();
        assert!(matches!(invalid.validate(), Err(LoaderError::ConfigError(_))));

        let invalid = LoaderConfig::builder()
            .fetch_timeout(Duration::ZERO)
            .build();
        assert!(invalid.validate().is_err());

        let mut invalid = LoaderConfig::default();
        invalid.cache.ttl_jitter = 2.0;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: LoaderConfig = serde_json::from_str(
            r#"{
                "registry": "https://registry.example.com",
                "include": [{"name": {"regex": "^ama"}}],
                "exclude": [{"name": "ama-internal"}],
                "fetch_timeout": {"secs": 5, "nanos": 0}
            }"#,
        )
        .unwrap();

        assert_eq!(config.registry, "https://registry.example.com");
        assert_eq!(config.cache.ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.fetch_timeout, Some(Duration::from_secs(5)));
        assert!(config.policy.is_allowed("ama", "1.0.0"));
        assert!(!config.policy.is_allowed("ama-internal", "1.0.0"));
        assert!(!config.policy.is_allowed("other", "1.0.0"));
    }

    #[test]
    fn test_parse_ttl_ms() {
        assert_eq!(parse_ttl_ms("1500").unwrap(), Some(Duration::from_millis(1500)));
        assert_eq!(parse_ttl_ms("0").unwrap(), None);
        assert_eq!(parse_ttl_ms("OFF").unwrap(), None);
        assert_eq!(parse_ttl_ms(" false ").unwrap(), None);
        assert!(parse_ttl_ms("soon").is_err());
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_registry() {
        let config = LoaderConfig::builder().registry("::::").build();
        let result = PackageLoader::new(config, Arc::new(StaticFetcher::new()));
        assert!(matches!(result, Err(LoaderError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_package_url() {
        let loader = PackageLoader::new(LoaderConfig::default(), Arc::new(StaticFetcher::new()))
            .unwrap();
        assert_eq!(
            loader.package_url("react", "18.2.0"),
            "https://registry.npmjs.org/react/18.2.0"
        );
    }
}
