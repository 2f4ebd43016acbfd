use crate::{PrefetchWorker, Result};
use portable_atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// A unit of background work pinned to one [`PrefetchWorker`].
///
/// Every sweep of the worker calls [`AffinityJob::run`] once per job it
/// owns. Jobs are expected to be cheap when there is nothing to do.
pub trait AffinityJob: Send + Sync {
    /// Key used to pick the job's worker. Stable for the job's lifetime.
    fn job_id(&self) -> &str;

    /// Performs one round of work.
    ///
    /// # Errors
    ///
    /// Errors are logged by the worker, which then moves on to the next job.
    fn run(&self) -> Result<()>;

    /// The job's link to the worker that owns it.
    fn binding(&self) -> &WorkerBinding;

    /// Index of the worker the job is bound to, if any.
    fn bound_worker(&self) -> Option<usize> {
        self.binding().index()
    }
}

/// Records which worker a job is bound to.
///
/// The first binding wins. The worker is held weakly so a job never keeps a
/// stopped pool's threads reachable.
#[derive(Debug, Default)]
pub struct WorkerBinding {
    bound: OnceLock<(usize, Weak<PrefetchWorker>)>,
}

impl WorkerBinding {
    pub const fn new() -> Self {
        Self {
            bound: OnceLock::new(),
        }
    }

    /// Binds to `worker` unless already bound, and returns the index of the
    /// worker the job is bound to afterwards.
    pub fn bind(&self, index: usize, worker: &Arc<PrefetchWorker>) -> usize {
        self.bound
            .get_or_init(|| (index, Arc::downgrade(worker)))
            .0
    }

    pub fn index(&self) -> Option<usize> {
        self.bound.get().map(|(index, _)| *index)
    }

    /// The bound worker, while it is still alive.
    pub fn worker(&self) -> Option<Arc<PrefetchWorker>> {
        self.bound.get().and_then(|(_, worker)| worker.upgrade())
    }

    /// Wakes the bound worker. Returns `false` if the job is unbound or the
    /// worker is gone.
    pub fn wakeup(&self) -> bool {
        self.worker().is_some_and(|worker| {
            worker.wakeup();
            true
        })
    }
}

/// Running counters of a prefetch job.
#[derive(Debug, Default)]
pub struct JobStats {
    runs: AtomicU64,
    installs: AtomicU64,
    transient_failures: AtomicU64,
    anomalies: AtomicU64,
    cutovers: AtomicU64,
}

/// A point-in-time copy of [`JobStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JobStatsSnapshot {
    /// Calls to `run` while the job was live.
    pub runs: u64,
    /// Segments installed into the chain.
    pub installs: u64,
    /// Reservations that failed with a transient store error.
    pub transient_failures: u64,
    /// Reserved segments discarded for going backwards.
    pub anomalies: u64,
    /// Cutovers performed by the job itself.
    pub cutovers: u64,
}

impl JobStats {
    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_install(&self) {
        self.installs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_failure(&self) {
        self.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_anomaly(&self) {
        self.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cutover(&self) {
        self.cutovers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> JobStatsSnapshot {
        JobStatsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            installs: self.installs.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
            cutovers: self.cutovers.load(Ordering::Relaxed),
        }
    }
}
