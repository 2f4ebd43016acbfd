//! Foreground load against a [`SegmentIdFactory`].
//!
//! Every namespace gets `threads` OS threads, each allocating
//! `ids_per_thread` ids. The run checks what the allocator promises: ids
//! are unique per namespace and strictly increase within a thread.

use crate::app::config::AppConfig;
use anyhow::{Context, anyhow, bail};
use segid::{JobStatsSnapshot, MaxIdStore, SegmentIdFactory, SegmentIdGenerator};
use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, Ordering},
    thread::scope,
    time::{Duration, Instant},
};
use tracing::{debug, info};

/// How many ids a thread allocates between checks of the stop flag.
const STOP_CHECK_INTERVAL: usize = 4096;

#[derive(Debug, Clone)]
pub struct NamespaceReport {
    pub namespace: String,
    pub issued: usize,
    pub min_id: Option<u64>,
    pub max_id: Option<u64>,
    pub stats: JobStatsSnapshot,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub namespaces: Vec<NamespaceReport>,
    pub elapsed: Duration,
    pub interrupted: bool,
}

impl LoadReport {
    pub fn issued(&self) -> usize {
        self.namespaces.iter().map(|report| report.issued).sum()
    }

    /// Ids per second over the whole run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.issued() as f64 / secs
        }
    }
}

fn run_thread(
    generator: &impl SegmentIdGenerator,
    ids: usize,
    stop: &AtomicBool,
) -> anyhow::Result<Vec<u64>> {
    let mut issued = Vec::with_capacity(ids);
    for n in 0..ids {
        if n % STOP_CHECK_INTERVAL == 0 && stop.load(Ordering::Relaxed) {
            break;
        }
        let id = generator
            .next_id()
            .with_context(|| format!("allocation failed in `{}`", generator.namespace()))?;
        if let Some(&last) = issued.last() {
            if id <= last {
                bail!(
                    "`{}` went backwards within a thread: {last} then {id}",
                    generator.namespace()
                );
            }
        }
        issued.push(id);
    }
    Ok(issued)
}

/// Runs the configured load to completion, or until `stop` is raised.
pub fn run_load<S>(
    factory: &SegmentIdFactory<S>,
    config: &AppConfig,
    stop: &AtomicBool,
) -> anyhow::Result<LoadReport>
where
    S: MaxIdStore + 'static,
{
    let generators = config
        .namespaces
        .iter()
        .map(|namespace| factory.generator(namespace))
        .collect::<Result<Vec<_>, _>>()?;

    let start = Instant::now();
    let per_namespace = scope(|s| {
        let handles: Vec<Vec<_>> = generators
            .iter()
            .map(|generator| {
                (0..config.threads)
                    .map(|_| {
                        s.spawn(move || {
                            run_thread(generator.as_ref(), config.ids_per_thread, stop)
                        })
                    })
                    .collect()
            })
            .collect();

        handles
            .into_iter()
            .map(|threads| {
                threads
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .map_err(|_| anyhow!("load thread panicked"))?
                    })
                    .collect::<anyhow::Result<Vec<_>>>()
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })?;
    let elapsed = start.elapsed();

    let mut namespaces = Vec::with_capacity(generators.len());
    for (generator, threads) in generators.iter().zip(per_namespace) {
        let mut seen = HashSet::with_capacity(threads.iter().map(Vec::len).sum());
        for id in threads.into_iter().flatten() {
            if !seen.insert(id) {
                bail!("`{}` issued id {id} twice", generator.namespace());
            }
        }
        let report = NamespaceReport {
            namespace: generator.namespace().to_owned(),
            issued: seen.len(),
            min_id: seen.iter().min().copied(),
            max_id: seen.iter().max().copied(),
            stats: generator.job().stats().snapshot(),
        };
        debug!(?report, "namespace finished");
        namespaces.push(report);
    }

    let report = LoadReport {
        namespaces,
        elapsed,
        interrupted: stop.load(Ordering::Relaxed),
    };
    info!(
        issued = report.issued(),
        elapsed = ?report.elapsed,
        ids_per_sec = report.throughput() as u64,
        interrupted = report.interrupted,
        "load finished"
    );
    Ok(report)
}
