//! Stale-while-revalidate cache demo.
//!
//! This binary drives a simulated catalog service through the cache so the
//! fresh / stale / miss behavior can be watched from the terminal.

use clap::Parser;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog_cache::{
    CacheConfig, CacheCoordinator, CacheKey, CacheStore, Cli, DemoCommand, Freshness,
    ManualClock, SimulateArgs,
};

/// One page of catalog results, tagged with the fetch that produced it.
#[derive(Debug, Clone)]
struct CatalogPage {
    version: u32,
    items: Vec<String>,
}

/// Stand-in for the remote catalog API.
struct SimulatedCatalog {
    latency: Duration,
    fail_every: u32,
    calls: AtomicU32,
}

impl SimulatedCatalog {
    fn new(latency: Duration, fail_every: u32) -> Self {
        Self {
            latency,
            fail_every,
            calls: AtomicU32::new(0),
        }
    }

    async fn fetch(self: Arc<Self>, key: String) -> Result<CatalogPage, String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.latency).await;

        if self.fail_every > 0 && call % self.fail_every == 0 {
            return Err(format!("catalog unavailable (call {})", call));
        }

        Ok(CatalogPage {
            version: call,
            items: vec![format!("{} item A", key), format!("{} item B", key)],
        })
    }
}

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::from_default_env().add_directive("catalog_cache=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Cli::parse();

    match args.command {
        DemoCommand::Simulate(opts) => simulate(opts).await?,
        DemoCommand::Timeline => timeline(),
    }

    Ok(())
}

async fn simulate(opts: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = opts.cache_config()?;
    let cache: CacheCoordinator<CatalogPage, String> =
        CacheCoordinator::new(CacheStore::new(config));
    let catalog = Arc::new(SimulatedCatalog::new(
        Duration::from_millis(opts.latency_ms),
        opts.fail_every,
    ));

    info!(
        requests = opts.requests,
        keys = opts.keys,
        "starting simulation"
    );

    for i in 0..opts.requests {
        let key = CacheKey::new("courses")
            .push("list")
            .push(i % opts.keys.max(1))
            .to_string();

        let outcome = match cache.store().freshness(&key) {
            Some(Freshness::Fresh) => "fresh hit",
            Some(Freshness::Stale) => "stale hit, revalidating",
            Some(Freshness::Expired) => "expired, refetching",
            None => "miss",
        };

        let started = Instant::now();
        let source = Arc::clone(&catalog);
        let fetch_key = key.clone();
        let result = cache
            .fetch_with_cache(&key, move || source.fetch(fetch_key))
            .await;
        let elapsed = started.elapsed().as_millis();

        match result {
            Ok(page) => println!(
                "#{:<3} {:<18} {:<24} v{} ({} items) in {}ms",
                i,
                key,
                outcome,
                page.version,
                page.items.len(),
                elapsed
            ),
            Err(e) => println!("#{:<3} {:<18} {:<24} error: {}", i, key, outcome, e),
        }

        tokio::time::sleep(Duration::from_millis(opts.interval_ms)).await;
    }

    // Give any background refresh time to land before reporting
    tokio::time::sleep(Duration::from_millis(opts.latency_ms * 2)).await;

    let entries = cache.store().stats();
    let counters = cache.store().counters();
    println!();
    println!(
        "Entries: total={} fresh={} stale={}",
        entries.total, entries.fresh, entries.stale
    );
    println!(
        "Reads: hits={} stale_hits={} misses={} hit_rate={:.1}%",
        counters.hits, counters.stale_hits, counters.misses, counters.hit_rate
    );
    println!(
        "Fetches: upstream_calls={} revalidations={} failed_revalidations={} deduplicated={}",
        catalog.calls.load(Ordering::SeqCst),
        counters.revalidations,
        counters.revalidation_failures,
        counters.deduplicated
    );

    Ok(())
}

fn timeline() {
    let clock = ManualClock::new();
    let store: CacheStore<u32> = CacheStore::with_clock(CacheConfig::default(), clock.clone());

    store.set("a", 1);
    println!("t=   0s set(\"a\", 1)");

    let mut elapsed = 0;
    for probe in [30u64, 125, 601] {
        clock.advance(Duration::from_secs(probe - elapsed));
        elapsed = probe;

        let state = store
            .freshness("a")
            .map(|f| f.to_string())
            .unwrap_or_else(|| "absent".to_string());
        let is_stale = store.is_stale("a");
        let value = store.get("a");

        println!(
            "t={:>4}s state={:<8} is_stale={:<5} get={:?}",
            probe, state, is_stale, value
        );
    }

    let stats = store.stats();
    println!(
        "Entries: total={} fresh={} stale={}",
        stats.total, stats.fresh, stats.stale
    );
}
