use crate::{AffinityJob, Error, Result};
use core::{fmt, time::Duration};
use parking_lot::{Mutex, RwLock};
use portable_atomic::{AtomicBool, Ordering};
use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Weak},
    thread::{self, JoinHandle, Thread},
    time::Instant,
};
use tracing::{debug, error, info, trace};

/// How often [`PrefetchWorker::join`] polls a finishing thread.
const JOIN_POLL: Duration = Duration::from_millis(5);

/// One background thread that periodically runs every job pinned to it.
///
/// Between sweeps the thread parks for the configured period. A
/// [`PrefetchWorker::wakeup`] cuts the park short so a hungry namespace does
/// not have to wait out the period. The thread only holds a weak reference to
/// the worker: dropping the last [`Arc`] ends it after the current park.
pub struct PrefetchWorker {
    index: usize,
    name: String,
    period: Duration,
    jobs: RwLock<Vec<Arc<dyn AffinityJob>>>,
    shutdown: AtomicBool,
    running: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
    unparker: Mutex<Option<Thread>>,
}

impl PrefetchWorker {
    /// Creates an idle worker. No thread runs until [`PrefetchWorker::start`].
    pub fn new(index: usize, period: Duration) -> Self {
        Self {
            index,
            name: format!("segid-prefetch-{index}"),
            period,
            jobs: RwLock::new(Vec::new()),
            shutdown: AtomicBool::new(false),
            running: AtomicBool::new(false),
            thread: Mutex::new(None),
            unparker: Mutex::new(None),
        }
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    /// Thread name, `segid-prefetch-<index>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of jobs pinned to this worker.
    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }

    /// Returns `true` while a sweep is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Returns `true` once the thread has been spawned.
    pub fn is_started(&self) -> bool {
        self.unparker.lock().is_some()
    }

    /// Pins `job` to this worker. Submitting the same job twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] after [`PrefetchWorker::shutdown`].
    pub fn submit(&self, job: Arc<dyn AffinityJob>) -> Result<()> {
        if self.is_shutdown() {
            return Err(Error::Shutdown);
        }
        let mut jobs = self.jobs.write();
        if jobs.iter().any(|known| Arc::ptr_eq(known, &job)) {
            return Ok(());
        }
        info!(worker = %self.name, job = job.job_id(), "job submitted");
        jobs.push(job);
        Ok(())
    }

    /// Unpins `job`. Returns `false` if the worker does not hold it.
    ///
    /// A sweep already in progress may still run the job once.
    pub fn remove(&self, job: &Arc<dyn AffinityJob>) -> bool {
        let mut jobs = self.jobs.write();
        let Some(position) = jobs.iter().position(|known| Arc::ptr_eq(known, job)) else {
            return false;
        };
        jobs.swap_remove(position);
        info!(worker = %self.name, job = job.job_id(), "job removed");
        true
    }

    /// Spawns the worker thread. Starting an already started worker is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::Shutdown`] if the worker was shut down.
    /// - [`Error::WorkerSpawn`] if the OS refused to create the thread.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.is_shutdown() {
            return Err(Error::Shutdown);
        }
        let mut unparker = self.unparker.lock();
        if unparker.is_some() {
            return Ok(());
        }

        let weak = Arc::downgrade(self);
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || Self::run_loop(&weak))
            .map_err(|e| Error::WorkerSpawn {
                worker: self.name.clone(),
                reason: e.to_string(),
            })?;

        *unparker = Some(handle.thread().clone());
        *self.thread.lock() = Some(handle);
        info!(worker = %self.name, period = ?self.period, "prefetch worker started");
        Ok(())
    }

    /// Cuts the current park short. Does nothing while a sweep is already
    /// running or before the thread has started.
    pub fn wakeup(&self) {
        if self.is_running() {
            return;
        }
        if let Some(thread) = self.unparker.lock().as_ref() {
            debug!(worker = %self.name, "wakeup");
            thread.unpark();
        }
    }

    /// Asks the thread to exit after its current sweep. New submissions are
    /// rejected from now on.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(worker = %self.name, "prefetch worker shutting down");
        if let Some(thread) = self.unparker.lock().as_ref() {
            thread.unpark();
        }
    }

    /// Waits up to `timeout` for the thread to exit.
    ///
    /// Returns `true` if the thread has exited (or was never started). A zero
    /// timeout only checks.
    pub fn join(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.thread.lock();
        let Some(handle) = slot.as_ref() else {
            return true;
        };
        while !handle.is_finished() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(JOIN_POLL.min(deadline - now));
        }
        if let Some(handle) = slot.take() {
            // The loop catches job panics, so a failed join means the loop
            // itself is broken.
            if handle.join().is_err() {
                error!(worker = %self.name, "prefetch worker thread panicked");
            }
        }
        true
    }

    /// Runs every job once on the calling thread.
    pub fn sweep(&self) {
        self.running.store(true, Ordering::Release);
        let jobs = self.jobs.read().clone();
        for job in &jobs {
            if self.is_shutdown() {
                break;
            }
            match catch_unwind(AssertUnwindSafe(|| job.run())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(worker = %self.name, job = job.job_id(), error = %e, "prefetch job failed");
                }
                Err(panic) => {
                    error!(
                        worker = %self.name,
                        job = job.job_id(),
                        panic = panic_message(panic.as_ref()),
                        "prefetch job panicked"
                    );
                }
            }
        }
        self.running.store(false, Ordering::Release);
    }

    fn run_loop(worker: &Weak<Self>) {
        loop {
            let Some(this) = worker.upgrade() else {
                break;
            };
            if this.is_shutdown() {
                break;
            }
            this.sweep();
            if this.is_shutdown() {
                break;
            }
            let period = this.period;
            drop(this);
            thread::park_timeout(period);
        }
        trace!("prefetch worker exited");
    }
}

impl fmt::Debug for PrefetchWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchWorker")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("jobs", &self.job_count())
            .field("shutdown", &self.is_shutdown())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
