use crate::{
    AffinityJob, Allocation, ChainNode, PrefetchJob, PrefetchWorkerPool, Result, SegmentChain,
    SegmentConfig, SegmentDistributor, SegmentIdGenerator,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// The per-namespace id generator.
///
/// Ids come from the chain's current segment through a single atomic
/// increment. When the consumed share of a segment crosses
/// `prefetch_threshold`, the namespace's prefetch worker is woken once so the
/// next segment is usually ready before it is needed. When it is not, the
/// caller reports hunger and reserves `safe_distance` base steps itself.
///
/// # Example
///
/// ```
/// use segid::{
///     CachedClock, MemoryMaxIdStore, SegmentChainId, SegmentConfig, SegmentIdGenerator,
///     StoreSegmentDistributor,
/// };
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryMaxIdStore::with_auto_create());
/// let distributor =
///     StoreSegmentDistributor::new("orders", 10, store, CachedClock::global()).unwrap();
/// let generator = SegmentChainId::new(distributor, SegmentConfig::with_step(10)).unwrap();
///
/// assert_eq!(generator.next_id().unwrap(), 1);
/// assert_eq!(generator.next_id().unwrap(), 2);
/// ```
#[derive(Debug)]
pub struct SegmentChainId<D: SegmentDistributor> {
    distributor: Arc<D>,
    chain: Arc<SegmentChain>,
    job: Arc<PrefetchJob<D>>,
    config: SegmentConfig,
}

impl<D: SegmentDistributor + 'static> SegmentChainId<D> {
    /// Creates a generator without a background worker. Every new segment
    /// is reserved by the caller that needs it.
    ///
    /// `config.step` is not consulted: segments are reserved in units of the
    /// distributor's step.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if `config` does not validate.
    pub fn new(distributor: D, config: SegmentConfig) -> Result<Self> {
        config.validate()?;
        let distributor = Arc::new(distributor);
        let chain = Arc::new(SegmentChain::new(distributor.namespace()));
        let job = Arc::new(PrefetchJob::new(
            Arc::clone(&distributor),
            Arc::clone(&chain),
            config,
        ));
        Ok(Self {
            distributor,
            chain,
            job,
            config,
        })
    }

    /// Creates a generator whose prefetch job runs on `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] for a bad `config`, and
    /// [`crate::Error::Shutdown`] if the pool was stopped.
    pub fn with_pool(
        distributor: D,
        config: SegmentConfig,
        pool: &PrefetchWorkerPool,
    ) -> Result<Self> {
        let generator = Self::new(distributor, config)?;
        pool.submit(generator.job.clone())?;
        Ok(generator)
    }
}

impl<D: SegmentDistributor> SegmentChainId<D> {
    pub fn distributor(&self) -> &Arc<D> {
        &self.distributor
    }

    pub fn chain(&self) -> &Arc<SegmentChain> {
        &self.chain
    }

    /// The namespace's background job.
    pub fn job(&self) -> &Arc<PrefetchJob<D>> {
        &self.job
    }

    pub const fn config(&self) -> &SegmentConfig {
        &self.config
    }

    fn maybe_signal(&self, node: &ChainNode) {
        if node.consumed_percent() >= self.config.prefetch_threshold
            && node.claim_threshold_signal()
        {
            debug!(
                namespace = self.distributor.namespace(),
                version = node.version(),
                "prefetch threshold crossed"
            );
            self.job.binding().wakeup();
        }
    }

    /// Reserves a segment on the calling thread when nothing is ready.
    ///
    /// A segment that would go backwards is discarded and counted; the
    /// caller simply tries again.
    fn refill(&self, now: u64) -> Result<()> {
        self.job.mark_hungry(now);
        self.job.binding().wakeup();

        let _fill = self.chain.lock_fill();
        let current = self.chain.current();
        if let Some(current) = &current {
            // Someone else refilled while we waited for the lock.
            if current.has_capacity(now) || self.chain.next().is_some() {
                return Ok(());
            }
        }

        let installed = self
            .distributor
            .next_chain_node(
                current.as_ref(),
                self.config.safe_distance,
                self.config.ttl_secs,
            )
            .and_then(|node| self.chain.install(node));
        match installed {
            Ok(_) => {}
            // The caller's loop reserves again.
            Err(e) if e.is_ordering_anomaly() => {
                self.job.stats().record_anomaly();
                warn!(namespace = self.distributor.namespace(), error = %e, "gave up reserved segment");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        if let Some(current) = current {
            self.chain.cutover(current.version());
        }
        Ok(())
    }
}

impl<D: SegmentDistributor> SegmentIdGenerator for SegmentChainId<D> {
    fn namespace(&self) -> &str {
        self.distributor.namespace()
    }

    fn next_id(&self) -> Result<u64> {
        loop {
            let now = self.distributor.now_secs();
            let Some(current) = self.chain.current() else {
                self.refill(now)?;
                continue;
            };

            match current.try_next(now) {
                Allocation::Issued { id } => {
                    self.maybe_signal(&current);
                    return Ok(id);
                }
                Allocation::Exhausted | Allocation::Expired => {
                    let moved_on = self.chain.cutover(current.version())
                        || self
                            .chain
                            .current()
                            .is_some_and(|latest| latest.version() != current.version());
                    if !moved_on {
                        self.refill(now)?;
                    }
                }
            }
        }
    }
}
