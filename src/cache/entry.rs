//! Cache entry management with idle deadlines

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// A cache entry with its idle deadline and metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// Identifies this entry's record in the expiry queue
    pub(crate) slot: u64,

    /// When the entry expires if left untouched; `None` never expires
    pub(crate) expires_at: Option<Instant>,

    /// Entry metadata
    pub metadata: CacheMetadata,
}

impl<V> CacheEntry<V> {
    /// Create a new entry that expires `ttl` after `now`
    pub(crate) fn new(value: V, slot: u64, now: Instant, ttl: Option<Duration>) -> Self {
        let created_at = Utc::now();

        Self {
            value,
            slot,
            expires_at: ttl.map(|ttl| now + ttl),
            metadata: CacheMetadata {
                created_at,
                accessed_at: created_at,
                access_count: 0,
                version: 1,
            },
        }
    }

    /// Check if the entry has expired at `now`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }

    /// Time left before the entry expires, if it expires at all
    pub fn time_until_expiration(&self, now: Instant) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(now))
    }

    /// Mark the entry as accessed and restart its idle countdown
    pub(crate) fn touch(&mut self, now: Instant, ttl: Option<Duration>) {
        self.expires_at = ttl.map(|ttl| now + ttl);
        self.metadata.accessed_at = Utc::now();
        self.metadata.access_count += 1;
    }

    /// Replace the value and restart the idle countdown
    pub(crate) fn update_value(&mut self, value: V, now: Instant, ttl: Option<Duration>) {
        self.value = value;
        self.expires_at = ttl.map(|ttl| now + ttl);
        self.metadata.accessed_at = Utc::now();
        self.metadata.version += 1;
    }
}

/// Metadata associated with a cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last read or write
    pub accessed_at: DateTime<Utc>,

    /// Number of reads since creation
    pub access_count: u64,

    /// Version number (incremented on overwrite)
    pub version: u64,
}

impl CacheMetadata {
    /// Check if the entry has not been accessed for longer than `threshold`
    pub fn is_stale(&self, threshold: Duration) -> bool {
        let time_since_access = Utc::now() - self.accessed_at;
        time_since_access.to_std().unwrap_or(Duration::from_secs(0)) > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_entry_creation() {
        let now = Instant::now();
        let entry = CacheEntry::new("value", 7, now, Some(Duration::from_secs(60)));

        assert_eq!(entry.value, "value");
        assert_eq!(entry.slot, 7);
        assert_eq!(entry.metadata.version, 1);
        assert!(!entry.is_expired_at(now));
        assert!(entry.is_expired_at(now + Duration::from_secs(60)));
    }

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let now = Instant::now();
        let entry = CacheEntry::new(1u32, 0, now, None);

        assert!(!entry.is_expired_at(now + Duration::from_secs(86_400 * 365)));
        assert_eq!(entry.time_until_expiration(now), None);
    }

    #[test]
    fn test_touch_slides_deadline() {
        let start = Instant::now();
        let ttl = Some(Duration::from_millis(1000));
        let mut entry = CacheEntry::new("value", 0, start, ttl);

        entry.touch(start + Duration::from_millis(600), ttl);

        assert!(!entry.is_expired_at(start + Duration::from_millis(1200)));
        assert!(entry.is_expired_at(start + Duration::from_millis(1600)));
        assert_eq!(entry.metadata.access_count, 1);
    }

    #[test]
    fn test_update_value() {
        let now = Instant::now();
        let ttl = Some(Duration::from_secs(10));
        let mut entry = CacheEntry::new("old", 0, now, ttl);

        entry.update_value("new", now + Duration::from_secs(5), ttl);

        assert_eq!(entry.value, "new");
        assert_eq!(entry.metadata.version, 2);
        assert_eq!(
            entry.time_until_expiration(now + Duration::from_secs(5)),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_metadata_staleness() {
        let metadata = CacheMetadata {
            created_at: Utc::now() - chrono::Duration::hours(2),
            accessed_at: Utc::now() - chrono::Duration::hours(1),
            access_count: 10,
            version: 1,
        };

        assert!(metadata.is_stale(Duration::from_secs(1800)));
        assert!(!metadata.is_stale(Duration::from_secs(7200)));
    }
}
