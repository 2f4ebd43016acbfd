use crate::{
    AffinityJob, ChainState, JobStats, MAX_PREFETCH_DISTANCE, Result, SegmentChain, SegmentConfig,
    SegmentDistributor, WorkerBinding,
};
use portable_atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, info_span, trace, warn};

/// A namespace counts as hungry for this many seconds after a foreground
/// caller ran out of ids.
pub const HUNGER_THRESHOLD_SECS: u64 = 1;

const NEVER: u64 = u64::MAX;

/// The background half of a namespace: keeps a next segment ready in the
/// namespace's [`SegmentChain`].
///
/// The job adapts how many base steps it reserves at once. Every run in
/// which the namespace was hungry doubles the distance (up to
/// [`MAX_PREFETCH_DISTANCE`]); every other run halves it back toward the
/// configured `safe_distance`.
#[derive(Debug)]
pub struct PrefetchJob<D: SegmentDistributor> {
    distributor: Arc<D>,
    chain: Arc<SegmentChain>,
    config: SegmentConfig,
    distance: AtomicU32,
    last_hunger_secs: AtomicU64,
    retired: AtomicBool,
    binding: WorkerBinding,
    stats: JobStats,
}

impl<D: SegmentDistributor> PrefetchJob<D> {
    pub fn new(distributor: Arc<D>, chain: Arc<SegmentChain>, config: SegmentConfig) -> Self {
        Self {
            distributor,
            chain,
            config,
            distance: AtomicU32::new(config.safe_distance),
            last_hunger_secs: AtomicU64::new(NEVER),
            retired: AtomicBool::new(false),
            binding: WorkerBinding::new(),
            stats: JobStats::default(),
        }
    }

    pub fn chain(&self) -> &Arc<SegmentChain> {
        &self.chain
    }

    pub const fn stats(&self) -> &JobStats {
        &self.stats
    }

    /// Base steps the next background reservation will cover.
    pub fn prefetch_distance(&self) -> u32 {
        self.distance.load(Ordering::Relaxed)
    }

    /// Records that a foreground caller found no id ready at `now_secs`.
    pub fn mark_hungry(&self, now_secs: u64) {
        self.last_hunger_secs.store(now_secs, Ordering::Relaxed);
    }

    /// Returns `true` if hunger was reported less than
    /// [`HUNGER_THRESHOLD_SECS`] before `now_secs`.
    pub fn is_hungry(&self, now_secs: u64) -> bool {
        now_secs
            .checked_sub(self.last_hunger_secs.load(Ordering::Relaxed))
            .is_some_and(|gap| gap < HUNGER_THRESHOLD_SECS)
    }

    /// Turns the job into a no-op. The worker keeps it but never touches the
    /// chain again.
    pub fn retire(&self) {
        if !self.retired.swap(true, Ordering::AcqRel) {
            info!(namespace = self.distributor.namespace(), "prefetch job retired");
        }
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// One prefetch round: adapt the distance, retire a dead current
    /// segment, and top up the next slot.
    ///
    /// Transient store failures and ordering anomalies are counted, logged,
    /// and swallowed; the next round retries.
    ///
    /// # Errors
    ///
    /// Returns non-transient errors such as a missing namespace or a step
    /// overflow.
    pub fn prefetch(&self) -> Result<()> {
        let now = self.distributor.now_secs();
        let distance = self.adjust_distance(self.is_hungry(now));

        if let Some(current) = self.chain.current() {
            if !current.has_capacity(now) && self.chain.cutover(current.version()) {
                self.stats.record_cutover();
            }
        }

        match self.chain.state() {
            ChainState::Active => self.append(distance, now),
            state => {
                trace!(namespace = self.distributor.namespace(), ?state, "nothing to prefetch");
                Ok(())
            }
        }
    }

    fn adjust_distance(&self, hungry: bool) -> u32 {
        let previous = self.distance.load(Ordering::Relaxed);
        let next = if hungry {
            previous.saturating_mul(2).min(MAX_PREFETCH_DISTANCE)
        } else {
            (previous / 2).max(self.config.safe_distance)
        };
        if next != previous {
            self.distance.store(next, Ordering::Relaxed);
            info!(
                namespace = self.distributor.namespace(),
                from = previous,
                to = next,
                hungry,
                "prefetch distance adjusted"
            );
        }
        next
    }

    fn append(&self, distance: u32, now: u64) -> Result<()> {
        let _fill = self.chain.lock_fill();
        // Re-check under the fill lock: a foreground caller may have filled
        // the slot while we waited.
        let Some(current) = self.chain.current() else {
            return Ok(());
        };
        if self.chain.next().is_some() {
            return Ok(());
        }

        let installed = self
            .distributor
            .next_chain_node(Some(&current), distance, self.config.ttl_secs)
            .and_then(|node| self.chain.install(node));

        match installed {
            Ok(true) => {
                self.stats.record_install();
                debug!(
                    namespace = self.distributor.namespace(),
                    segments = distance,
                    "prefetched next segment"
                );
                if !current.has_capacity(now) && self.chain.cutover(current.version()) {
                    self.stats.record_cutover();
                }
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) if e.is_transient() => {
                self.stats.record_transient_failure();
                warn!(namespace = self.distributor.namespace(), error = %e, "prefetch reservation failed");
                Ok(())
            }
            Err(e) if e.is_ordering_anomaly() => {
                self.stats.record_anomaly();
                warn!(namespace = self.distributor.namespace(), error = %e, "gave up prefetched segment");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl<D: SegmentDistributor> AffinityJob for PrefetchJob<D> {
    fn job_id(&self) -> &str {
        self.distributor.namespace()
    }

    fn run(&self) -> Result<()> {
        if self.is_retired() {
            return Ok(());
        }
        let span = info_span!("prefetch", namespace = self.distributor.namespace());
        let _enter = span.enter();
        self.stats.record_run();
        self.prefetch()
    }

    fn binding(&self) -> &WorkerBinding {
        &self.binding
    }
}
