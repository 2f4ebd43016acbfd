use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use core::time::Duration;
use segid::{MAX_PREFETCH_DISTANCE, PoolConfig, SegmentConfig, TTL_FOREVER};
use std::path::PathBuf;

/// Which max-id store backs the run.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// In-process map. Ranges are lost on exit.
    Memory,
    /// Embedded sled database at `SLED_PATH`.
    Sled,
}

/// Runtime configuration for the `segid` binary.
///
/// Every value is read from a CLI flag or its environment variable, with
/// defaults matching the library's.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "segid",
    version,
    about = "Drives segment-chain ID allocation against a prefetch pool"
)]
pub struct CliArgs {
    /// Interval between prefetch sweeps, in milliseconds.
    ///
    /// Environment variable: `PREFETCH_PERIOD_MS`
    #[arg(long, env = "PREFETCH_PERIOD_MS", default_value_t = 1000)]
    pub prefetch_period_ms: u64,

    /// Number of prefetch worker threads. Defaults to the number of CPUs.
    ///
    /// Environment variable: `CORE_POOL_SIZE`
    #[arg(long, env = "CORE_POOL_SIZE")]
    pub core_pool_size: Option<usize>,

    /// Stop the prefetch pool on Ctrl+C / SIGTERM instead of running the
    /// load to completion.
    ///
    /// Environment variable: `SHUTDOWN_HOOK`
    #[arg(long, env = "SHUTDOWN_HOOK", default_value_t = true, action = clap::ArgAction::Set)]
    pub shutdown_hook: bool,

    /// Ids reserved per base step.
    ///
    /// Environment variable: `STEP`
    #[arg(long, env = "STEP", default_value_t = segid::DEFAULT_STEP)]
    pub step: u64,

    /// Segment lifetime in seconds. Omit for segments that never expire.
    ///
    /// Environment variable: `TTL_SECS`
    #[arg(long, env = "TTL_SECS")]
    pub ttl_secs: Option<u64>,

    /// Base steps reserved when a namespace is not hungry.
    ///
    /// Environment variable: `SAFE_DISTANCE`
    #[arg(long, env = "SAFE_DISTANCE", default_value_t = segid::DEFAULT_SAFE_DISTANCE)]
    pub safe_distance: u32,

    /// Consumed percentage of a segment that wakes its prefetch worker.
    ///
    /// Environment variable: `PREFETCH_THRESHOLD`
    #[arg(long, env = "PREFETCH_THRESHOLD", default_value_t = segid::DEFAULT_PREFETCH_THRESHOLD)]
    pub prefetch_threshold: u8,

    /// Comma separated namespaces to allocate from.
    ///
    /// Environment variable: `NAMESPACES`
    #[arg(long, env = "NAMESPACES", value_delimiter = ',', default_value = "default")]
    pub namespaces: Vec<String>,

    /// Foreground threads per namespace.
    ///
    /// Environment variable: `THREADS`
    #[arg(long, env = "THREADS", default_value_t = 4)]
    pub threads: usize,

    /// Ids each foreground thread allocates.
    ///
    /// Environment variable: `IDS_PER_THREAD`
    #[arg(long, env = "IDS_PER_THREAD", default_value_t = 100_000)]
    pub ids_per_thread: usize,

    /// Max-id store backing the run.
    ///
    /// Environment variable: `STORE`
    #[arg(long, env = "STORE", value_enum, default_value_t = StoreKind::Memory)]
    pub store: StoreKind,

    /// Database directory for `--store sled`.
    ///
    /// Environment variable: `SLED_PATH`
    #[arg(long, env = "SLED_PATH", default_value = "segid.sled")]
    pub sled_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pool: PoolConfig,
    pub segment: SegmentConfig,
    pub namespaces: Vec<String>,
    pub threads: usize,
    pub ids_per_thread: usize,
    pub store: StoreKind,
    pub sled_path: PathBuf,
}

impl AppConfig {
    /// Total ids the run allocates across every namespace and thread.
    pub fn total_ids(&self) -> usize {
        self.namespaces.len() * self.threads * self.ids_per_thread
    }
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.prefetch_period_ms == 0 {
            bail!("PREFETCH_PERIOD_MS must be greater than 0");
        }
        if args.core_pool_size == Some(0) {
            bail!("CORE_POOL_SIZE must be greater than 0");
        }
        if args.safe_distance == 0 || args.safe_distance > MAX_PREFETCH_DISTANCE {
            bail!(
                "SAFE_DISTANCE ({}) must be within 1..={}",
                args.safe_distance,
                MAX_PREFETCH_DISTANCE
            );
        }
        if args.threads == 0 {
            bail!("THREADS must be greater than 0");
        }

        let mut namespaces: Vec<String> = args
            .namespaces
            .into_iter()
            .map(|namespace| namespace.trim().to_owned())
            .filter(|namespace| !namespace.is_empty())
            .collect();
        namespaces.sort_unstable();
        namespaces.dedup();
        if namespaces.is_empty() {
            bail!("NAMESPACES must name at least one namespace");
        }

        let mut pool = PoolConfig {
            prefetch_period: Duration::from_millis(args.prefetch_period_ms),
            shutdown_hook: args.shutdown_hook,
            ..PoolConfig::default()
        };
        if let Some(core_pool_size) = args.core_pool_size {
            pool.core_pool_size = core_pool_size;
        }
        let segment = SegmentConfig {
            step: args.step,
            ttl_secs: args.ttl_secs.unwrap_or(TTL_FOREVER),
            safe_distance: args.safe_distance,
            prefetch_threshold: args.prefetch_threshold,
        };
        pool.validate().context("invalid prefetch pool settings")?;
        segment.validate().context("invalid segment settings")?;

        Ok(Self {
            pool,
            segment,
            namespaces,
            threads: args.threads,
            ids_per_thread: args.ids_per_thread,
            store: args.store,
            sled_path: args.sled_path,
        })
    }
}
