//! KB Cache - workload driver
//!
//! Replays a knowledge-base listing workload against the cache and prints the
//! resulting statistics as JSON.
//!
//! # Run Sequence
//! 1. Initialize tracing subscriber for logging
//! 2. Load configuration from environment variables
//! 3. Create the cache (starts the expiration sweeper)
//! 4. Serve paged listing queries through the cache, invalidating listings
//!    after a simulated write
//! 5. Print statistics and destroy the cache

use anyhow::Context;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kb_cache::{CacheConfig, KbCache};

const CATEGORIES: [&str; 4] = ["VSAM", "JCL", "COBOL", "DB2"];
const PAGES: u32 = 5;
const PAGE_SIZE: u32 = 20;
const ROUNDS: u32 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kb_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting KB cache workload");

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: max_size={}, default_ttl={:?}, cleanup_interval={:?}, sliding_expiration={}",
        config.max_size, config.default_ttl, config.cleanup_interval, config.sliding_expiration
    );

    let cache: KbCache<Value> = KbCache::new(config);

    run_workload(&cache)?;

    let stats = cache.get_statistics();
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("Failed to serialize statistics")?
    );

    cache.destroy();
    info!("Workload complete");
    Ok(())
}

/// Serves every listing page once per round, then invalidates all listings
/// after the middle round as a save would.
fn run_workload(cache: &KbCache<Value>) -> anyhow::Result<()> {
    for round in 1..=ROUNDS {
        let mut queried = 0;

        for page in 1..=PAGES {
            for category in CATEGORIES {
                let options = json!({
                    "page": page,
                    "pageSize": PAGE_SIZE,
                    "sortBy": "title",
                    "filters": {"category": category},
                });
                let key = cache
                    .generate_key("entries", &options)
                    .context("Failed to derive listing key")?;

                if cache.get(&key).is_none() {
                    cache.set(key, query_entries(page, category), None);
                    queried += 1;
                }
            }
        }

        let filters_key = cache.generate_key("filters", &json!({"kind": "categories"}))?;
        if cache.get(&filters_key).is_none() {
            cache.set(filters_key, json!(CATEGORIES), None);
            queried += 1;
        }

        info!(round, queried, size = cache.size(), "Round complete");

        if round == 2 {
            let removed = cache
                .invalidate_pattern("entries:*")
                .context("Failed to invalidate listings")?;
            info!(removed, "Entry saved; listing pages invalidated");
        }
    }
    Ok(())
}

/// Stand-in for the expensive listing query.
fn query_entries(page: u32, category: &str) -> Value {
    let first = (page - 1) * PAGE_SIZE;
    let entries: Vec<Value> = (first..first + PAGE_SIZE)
        .map(|id| json!({"id": id, "title": format!("{category} entry {id}"), "category": category}))
        .collect();
    json!({"page": page, "pageSize": PAGE_SIZE, "entries": entries})
}
