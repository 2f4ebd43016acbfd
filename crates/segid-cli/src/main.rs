#![doc = include_str!("../README.md")]

mod app;

use app::config::{AppConfig, CliArgs};
use app::load::run_load;
use app::store::AppStore;
use app::telemetry::init_telemetry;
use clap::Parser;
use segid::{PrefetchWorkerPool, SegmentIdFactory};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let pool = Arc::new(PrefetchWorkerPool::new(config.pool.clone())?);
    pool.start()?;
    let store = Arc::new(AppStore::open(&config)?);
    let factory = Arc::new(SegmentIdFactory::new(
        store,
        Arc::clone(&pool),
        config.segment,
    )?);
    let stop = Arc::new(AtomicBool::new(false));

    let mut load = tokio::task::spawn_blocking({
        let factory = Arc::clone(&factory);
        let config = config.clone();
        let stop = Arc::clone(&stop);
        move || run_load(&factory, &config, &stop)
    });

    let outcome = if config.pool.shutdown_hook {
        tokio::select! {
            joined = &mut load => joined?,
            () = shutdown_signal() => {
                stop.store(true, Ordering::Relaxed);
                load.await?
            }
        }
    } else {
        load.await?
    };
    let report = outcome?;

    pool.stop();

    for namespace in &report.namespaces {
        tracing::info!(
            namespace = %namespace.namespace,
            issued = namespace.issued,
            min_id = ?namespace.min_id,
            max_id = ?namespace.max_id,
            prefetch_runs = namespace.stats.runs,
            prefetch_installs = namespace.stats.installs,
            transient_failures = namespace.stats.transient_failures,
            anomalies = namespace.stats.anomalies,
            "namespace summary"
        );
    }
    tracing::info!("segid shut down successfully");
    Ok(())
}

fn log_startup_info(config: &AppConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting segid with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting segid: {} namespaces x {} threads x {} ids on {} prefetch workers",
            config.namespaces.len(),
            config.threads,
            config.ids_per_thread,
            config.pool.core_pool_size
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, stopping load and prefetch workers...");
}
