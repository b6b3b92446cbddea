//! Command-line interface definitions.
//!
//! This module defines the CLI structure for the `swr-demo` binary using clap.

use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use crate::config::CacheConfig;
use crate::error::CacheResult;

/// Stale-while-revalidate cache demo.
///
/// Drives a simulated catalog service through the cache and reports what
/// the cache did for every request.
#[derive(Parser, Debug)]
#[command(name = "swr-demo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The command to execute.
    #[clap(subcommand)]
    pub command: DemoCommand,
}

/// Available demo commands.
#[derive(Subcommand, Debug)]
pub enum DemoCommand {
    /// Run requests against a simulated catalog service.
    ///
    /// Uses the real clock, so pick small ttl/stale values to see
    /// entries age during the run.
    Simulate(SimulateArgs),

    /// Replay the fresh/stale/expired timeline on a manual clock.
    ///
    /// Stores a value at t=0 and probes it at 30s, 125s and 601s with
    /// the default 2 minute stale threshold and 10 minute TTL.
    Timeline,
}

/// Options for the `simulate` command.
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of requests to issue.
    #[arg(long, default_value_t = 20)]
    pub requests: u32,

    /// Pause between requests, in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub interval_ms: u64,

    /// Number of distinct catalog keys to rotate through.
    #[arg(long, default_value_t = 2)]
    pub keys: u32,

    /// Simulated fetch latency, in milliseconds.
    #[arg(long, default_value_t = 50)]
    pub latency_ms: u64,

    /// Fail every Nth fetch (0 never fails).
    #[arg(long, default_value_t = 0)]
    pub fail_every: u32,

    /// Entry time-to-live, in milliseconds.
    #[arg(long, default_value_t = 1_000)]
    pub ttl_ms: u64,

    /// Stale threshold, in milliseconds.
    #[arg(long, default_value_t = 300)]
    pub stale_ms: u64,

    /// Disable single-flight deduplication.
    #[arg(long)]
    pub no_dedupe: bool,
}

impl SimulateArgs {
    /// Build the cache configuration these options describe.
    pub fn cache_config(&self) -> CacheResult<CacheConfig> {
        CacheConfig::new()
            .ttl(Duration::from_millis(self.ttl_ms))
            .stale_threshold(Duration::from_millis(self.stale_ms))
            .dedupe_in_flight(!self.no_dedupe)
            .build()
    }
}
