use crate::{AffinityJob, Error, PoolConfig, PrefetchWorker, Result};
use portable_atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Instant};
use tracing::{info, warn};

/// Maps a job id to one of `pool_size` workers using a 32-bit FNV-1a hash.
///
/// Pure and deterministic, so the same namespace always lands on the same
/// worker for a given pool size. A pool of one (or zero) always yields 0.
pub fn worker_index(job_id: &str, pool_size: usize) -> usize {
    if pool_size <= 1 {
        return 0;
    }
    (fnv1a(job_id.as_bytes()) as usize) % pool_size
}

fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// A fixed set of [`PrefetchWorker`]s with hash affinity.
///
/// All workers are created up front. Their threads are spawned by
/// [`PrefetchWorkerPool::start`], or lazily the first time a job is submitted
/// to them.
///
/// # Example
///
/// ```
/// use segid::{PoolConfig, PrefetchWorkerPool};
///
/// let pool = PrefetchWorkerPool::new(PoolConfig {
///     core_pool_size: 2,
///     ..PoolConfig::default()
/// })
/// .unwrap();
/// assert_eq!(pool.workers().len(), 2);
/// pool.stop();
/// assert!(pool.is_stopped());
/// ```
#[derive(Debug)]
pub struct PrefetchWorkerPool {
    config: PoolConfig,
    workers: Vec<Arc<PrefetchWorker>>,
    stopped: AtomicBool,
}

impl PrefetchWorkerPool {
    /// Creates `config.core_pool_size` idle workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate.
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let workers = (0..config.core_pool_size)
            .map(|index| Arc::new(PrefetchWorker::new(index, config.prefetch_period)))
            .collect();
        Ok(Self {
            config,
            workers,
            stopped: AtomicBool::new(false),
        })
    }

    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn workers(&self) -> &[Arc<PrefetchWorker>] {
        &self.workers
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// The worker that owns (or would own) `job_id`.
    pub fn worker_for(&self, job_id: &str) -> &Arc<PrefetchWorker> {
        &self.workers[worker_index(job_id, self.workers.len())]
    }

    /// Spawns every worker thread that is not running yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] after [`PrefetchWorkerPool::stop`], or the
    /// first [`Error::WorkerSpawn`].
    pub fn start(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::Shutdown);
        }
        for worker in &self.workers {
            worker.start()?;
        }
        info!(workers = self.workers.len(), "prefetch pool started");
        Ok(())
    }

    /// Binds `job` to its worker, hands it over, and makes sure the worker
    /// thread is running. Returns the worker index.
    ///
    /// A job that is already bound stays on its original worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] after [`PrefetchWorkerPool::stop`], or
    /// [`Error::WorkerSpawn`] if the worker thread could not be started.
    pub fn submit(&self, job: Arc<dyn AffinityJob>) -> Result<usize> {
        if self.is_stopped() {
            return Err(Error::Shutdown);
        }
        let hashed = worker_index(job.job_id(), self.workers.len());
        let index = job.binding().bind(hashed, &self.workers[hashed]);
        let worker = self.workers.get(index).ok_or_else(|| {
            Error::invalid_config(format!(
                "job `{}` is bound to worker {index} outside this pool",
                job.job_id()
            ))
        })?;
        worker.submit(job)?;
        worker.start()?;
        Ok(index)
    }

    /// Takes `job` off the worker it is bound to. Returns `false` if the job
    /// was never submitted here.
    pub fn remove(&self, job: &Arc<dyn AffinityJob>) -> bool {
        job.bound_worker()
            .and_then(|index| self.workers.get(index))
            .is_some_and(|worker| worker.remove(job))
    }

    /// Wakes the worker that owns `job_id`.
    pub fn wakeup(&self, job_id: &str) {
        self.worker_for(job_id).wakeup();
    }

    /// Shuts every worker down and waits up to `shutdown_timeout` for their
    /// in-flight sweeps. Calling it again does nothing.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(workers = self.workers.len(), "stopping prefetch pool");
        for worker in &self.workers {
            worker.shutdown();
        }
        if self.config.shutdown_timeout.is_zero() {
            return;
        }

        let deadline = Instant::now() + self.config.shutdown_timeout;
        for worker in &self.workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !worker.join(remaining) {
                warn!(worker = worker.name(), "prefetch worker did not stop in time");
            }
        }
        info!("prefetch pool stopped");
    }
}

impl Drop for PrefetchWorkerPool {
    fn drop(&mut self) {
        if self.config.shutdown_hook {
            self.stop();
        }
    }
}
