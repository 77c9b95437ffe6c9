//! Configuration for the expiring cache

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for an `ExpiringCache`
///
/// Expiry is idle-based: every read or write of a key restarts its
/// countdown. A `ttl` of `None` (or zero) disables expiry entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum idle time before an entry is dropped
    pub ttl: Option<Duration>,

    /// TTL jitter factor (0.0 - 1.0)
    /// Spreads expirations of entries touched at the same moment
    pub ttl_jitter: f64,

    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            // 1 hour idle TTL
            ttl: Some(Duration::from_secs(3600)),
            ttl_jitter: 0.0,
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Configuration that never expires entries
    pub fn unbounded() -> Self {
        Self {
            ttl: None,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err("ttl_jitter must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }

    /// Whether entries expire at all
    pub fn expires(&self) -> bool {
        matches!(self.ttl, Some(ttl) if !ttl.is_zero())
    }

    /// Idle period for one touch, with jitter applied
    ///
    /// Returns `None` when expiry is disabled.
    pub fn ttl_with_jitter(&self) -> Option<Duration> {
        let ttl = self.ttl.filter(|ttl| !ttl.is_zero())?;

        if self.ttl_jitter == 0.0 {
            return Some(ttl);
        }

        let base_secs = ttl.as_secs_f64();
        let jitter_range = base_secs * self.ttl_jitter;
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
        let final_secs = (base_secs + jitter).max(0.001);

        Some(Duration::from_secs_f64(final_secs))
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    ttl: Option<Option<Duration>>,
    ttl_jitter: Option<f64>,
    enable_metrics: Option<bool>,
}

impl CacheConfigBuilder {
    /// Set the idle TTL for cache entries
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(Some(ttl));
        self
    }

    /// Disable expiry
    pub fn disable_ttl(mut self) -> Self {
        self.ttl = Some(None);
        self
    }

    /// Set TTL jitter factor (0.0 - 1.0)
    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.ttl_jitter = Some(jitter);
        self
    }

    /// Enable or disable metrics collection
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            ttl: self.ttl.unwrap_or(defaults.ttl),
            ttl_jitter: self.ttl_jitter.unwrap_or(defaults.ttl_jitter),
            enable_metrics: self.enable_metrics.unwrap_or(defaults.enable_metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.ttl_jitter, 0.0);
        assert!(config.expires());
    }

    #[test]
    fn test_config_validation() {
        let valid_config = CacheConfig::default();
        assert!(valid_config.validate().is_ok());

        let mut invalid_config = CacheConfig::default();
        invalid_config.ttl_jitter = 1.5;
        assert!(invalid_config.validate().is_err());

        let mut invalid_config = CacheConfig::default();
        invalid_config.ttl_jitter = -0.1;
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .ttl(Duration::from_millis(600))
            .enable_metrics(false)
            .build();

        assert_eq!(config.ttl, Some(Duration::from_millis(600)));
        assert!(!config.enable_metrics);

        let config = CacheConfig::builder().disable_ttl().build();
        assert_eq!(config.ttl, None);
        assert!(!config.expires());
    }

    #[test]
    fn test_zero_ttl_disables_expiry() {
        let config = CacheConfig::builder().ttl(Duration::ZERO).build();
        assert!(!config.expires());
        assert_eq!(config.ttl_with_jitter(), None);

        assert!(!CacheConfig::unbounded().expires());
    }

    #[test]
    fn test_ttl_with_jitter() {
        let config = CacheConfig {
            ttl: Some(Duration::from_secs(3600)),
            ttl_jitter: 0.1,
            ..Default::default()
        };

        let ttl = config.ttl_with_jitter().unwrap();
        let base_secs = 3600.0;
        let jitter_range = base_secs * 0.1;

        assert!(ttl.as_secs_f64() >= base_secs - jitter_range);
        assert!(ttl.as_secs_f64() <= base_secs + jitter_range);
    }

    #[test]
    fn test_ttl_without_jitter_is_exact() {
        let config = CacheConfig::builder().ttl(Duration::from_millis(1000)).build();
        assert_eq!(config.ttl_with_jitter(), Some(Duration::from_millis(1000)));
    }
}
