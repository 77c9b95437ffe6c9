//! Package Asset Demo
//!
//! Loads files from an in-memory package mirror through a `PackageLoader`,
//! showing deduplicated loading, admission control and idle expiry.
//!
//! Usage:
//!   cargo run --example asset_demo
//!
//! Environment variables (also read from `.env`):
//!   PKGCACHE_REGISTRY         - Registry URL (default: https://registry.npmjs.org)
//!   PKGCACHE_TTL_MS           - Idle TTL in milliseconds, `off` disables (default: 3600000)
//!   PKGCACHE_FETCH_TIMEOUT_MS - Fetch timeout in milliseconds (default: none)
//!   RUST_LOG                  - Log filter (default: pkgcache=debug,asset_demo=info)

use futures::future::join_all;
use pkgcache::{LoaderConfig, PackageFile, PackageLoader, PackageSpecifier, StaticFetcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn mirror() -> StaticFetcher {
    StaticFetcher::new()
        .with_package(
            "ama",
            "1.0.0",
            vec![
                PackageFile::new("index.js", "export * from './main.js';"),
                PackageFile::new("main.js", "export const answer = 42;"),
            ],
        )
        .with_package(
            "ama-internal",
            "0.1.0",
            vec![PackageFile::new("index.js", "export const secret = true;")],
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pkgcache=debug,asset_demo=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Package Asset Demo ===");

    let mut config = LoaderConfig::from_env()?;
    config.policy.exclude = Some(vec![PackageSpecifier::name("ama-internal")]);

    let loader = PackageLoader::new(config, Arc::new(mirror()))?;
    info!("Registry URL for ama@1.0.0: {}", loader.package_url("ama", "1.0.0"));

    info!("\n--- Concurrent requests ---");
    let paths = ["index.js", "main.js", "index.js", "main.js"];
    let results = join_all(paths.iter().map(|path| loader.get_asset("ama", "1.0.0", path))).await;
    for (path, result) in paths.iter().zip(results) {
        match result? {
            Some(content) => info!("✓ {} ({} bytes)", path, content.len()),
            None => info!("✗ {} not found", path),
        }
    }
    let stats = loader.coordinator_stats();
    info!("Fetches started: {}, joined: {}", stats.started, stats.joined);

    info!("\n--- Missing asset ---");
    let readme = loader.get_asset("ama", "1.0.0", "README.md").await?;
    info!("README.md present: {}", readme.is_some());

    info!("\n--- Restricted package ---");
    match loader.get_asset("ama-internal", "0.1.0", "index.js").await {
        Ok(_) => info!("✗ restricted package was loaded"),
        Err(e) => info!("✓ {}", e),
    }

    info!("\n--- Cache ---");
    info!("Cached packages: {:?}", loader.cached_packages().await);
    info!("Cache stats: {}", loader.cache_stats().await);

    if let Some(ttl) = loader.config().cache.ttl.filter(|ttl| *ttl <= Duration::from_secs(5)) {
        info!("Waiting {:?} for idle expiry...", ttl);
        tokio::time::sleep(ttl + Duration::from_millis(100)).await;
        info!("Cached packages after idle period: {:?}", loader.cached_packages().await);
    }

    loader.clear().await;
    info!("\n=== Demo Complete ===");

    Ok(())
}
