//! # Expiring Cache
//!
//! A key/value cache with sliding idle expiration, used to bound the memory
//! held by fetched package content.
//!
//! ## Features
//!
//! - **Sliding TTL**: every read or write restarts a key's countdown
//! - **Single sweeper**: one background task per cache polls a min-heap of
//!   deadlines instead of keeping a timer per key
//! - **No stale reads**: reads check the deadline themselves, so an entry is
//!   never returned after it has expired
//! - **Metrics**: hit/miss/expiry counters
//!
//! ## Example
//!
//! ```rust
//! use pkgcache::cache::{CacheConfig, ExpiringCache};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = CacheConfig::builder()
//!     .ttl(Duration::from_secs(600)) // 10 minutes idle
//!     .build();
//!
//! let cache: ExpiringCache<String, String> = ExpiringCache::new(config);
//!
//! cache.set("react@18.2.0".to_string(), "cached".to_string()).await;
//!
//! if let Some(value) = cache.get(&"react@18.2.0".to_string()).await {
//!     println!("Cache hit: {}", value);
//! }
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod invalidation;
pub(crate) mod scheduler;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{CacheEntry, CacheMetadata};
pub use invalidation::{InvalidationEvent, InvalidationReason};
pub use store::ExpiringCache;
pub use types::CacheStats;
