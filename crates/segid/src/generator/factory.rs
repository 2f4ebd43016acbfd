use crate::{
    AffinityJob, CachedClock, Error, MaxIdStore, PrefetchWorkerPool, Result, SegmentChainId, SegmentConfig,
    SegmentIdGenerator, StoreSegmentDistributor, TimeSource,
};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::info;

/// The generator type a [`SegmentIdFactory`] hands out.
pub type StoreChainId<S, T = CachedClock> = SegmentChainId<StoreSegmentDistributor<S, T>>;

/// A registry of per-namespace generators sharing one store and one
/// prefetch pool.
///
/// The first request for a namespace builds its distributor, generator, and
/// prefetch job, and submits the job to the pool. Later (and concurrent)
/// requests get the same generator.
///
/// # Example
///
/// ```
/// use segid::{MemoryMaxIdStore, PoolConfig, PrefetchWorkerPool, SegmentConfig, SegmentIdFactory};
/// use std::sync::Arc;
///
/// let pool = Arc::new(
///     PrefetchWorkerPool::new(PoolConfig {
///         core_pool_size: 1,
///         ..PoolConfig::default()
///     })
///     .unwrap(),
/// );
/// let store = Arc::new(MemoryMaxIdStore::new());
/// let factory = SegmentIdFactory::new(store, pool.clone(), SegmentConfig::default()).unwrap();
///
/// factory.create_namespace("orders", 1000).unwrap();
/// assert_eq!(factory.next_id("orders").unwrap(), 1001);
/// pool.stop();
/// ```
#[derive(Debug)]
pub struct SegmentIdFactory<S, T = CachedClock>
where
    S: MaxIdStore,
    T: TimeSource + Send + Sync,
{
    store: Arc<S>,
    time: T,
    pool: Arc<PrefetchWorkerPool>,
    defaults: SegmentConfig,
    configs: RwLock<HashMap<String, SegmentConfig>>,
    generators: RwLock<HashMap<String, Arc<StoreChainId<S, T>>>>,
}

impl<S> SegmentIdFactory<S, CachedClock>
where
    S: MaxIdStore + 'static,
{
    /// A factory stamping segments with the process-wide cached clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `defaults` does not validate.
    pub fn new(
        store: Arc<S>,
        pool: Arc<PrefetchWorkerPool>,
        defaults: SegmentConfig,
    ) -> Result<Self> {
        Self::with_time(store, pool, defaults, CachedClock::global())
    }
}

impl<S, T> SegmentIdFactory<S, T>
where
    S: MaxIdStore + 'static,
    T: TimeSource + Clone + Send + Sync + 'static,
{
    /// A factory using `time` to stamp segments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `defaults` does not validate.
    pub fn with_time(
        store: Arc<S>,
        pool: Arc<PrefetchWorkerPool>,
        defaults: SegmentConfig,
        time: T,
    ) -> Result<Self> {
        defaults.validate()?;
        Ok(Self {
            store,
            time,
            pool,
            defaults,
            configs: RwLock::new(HashMap::new()),
            generators: RwLock::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn pool(&self) -> &Arc<PrefetchWorkerPool> {
        &self.pool
    }

    /// Settings used for namespaces without a registered override.
    pub const fn defaults(&self) -> &SegmentConfig {
        &self.defaults
    }

    /// The settings `namespace` uses (or will use).
    pub fn config_for(&self, namespace: &str) -> SegmentConfig {
        self.configs
            .read()
            .get(namespace)
            .copied()
            .unwrap_or(self.defaults)
    }

    /// Overrides the settings of one namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate or the
    /// namespace's generator already exists.
    pub fn register(&self, namespace: impl Into<String>, config: SegmentConfig) -> Result<()> {
        let namespace = namespace.into();
        config.validate()?;
        if self.generators.read().contains_key(&namespace) {
            return Err(Error::invalid_config(format!(
                "namespace `{namespace}` is already in use"
            )));
        }
        info!(
            namespace = %namespace,
            step = config.step,
            ttl_secs = config.ttl_secs,
            "namespace registered"
        );
        self.configs.write().insert(namespace, config);
        Ok(())
    }

    /// Starts tracking `namespace` in the store at `initial_max_id`. The first
    /// id issued will be `initial_max_id + 1`.
    ///
    /// Returns `false` if the store already tracks the namespace.
    pub fn create_namespace(&self, namespace: &str, initial_max_id: u64) -> Result<bool> {
        self.store.create(namespace, initial_max_id)
    }

    /// The generator for `namespace`, created on first use.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] for an empty namespace.
    /// - [`Error::Shutdown`] if the pool was stopped before the generator
    ///   existed.
    pub fn generator(&self, namespace: &str) -> Result<Arc<StoreChainId<S, T>>> {
        if let Some(generator) = self.generators.read().get(namespace) {
            return Ok(Arc::clone(generator));
        }

        let mut generators = self.generators.write();
        if let Some(generator) = generators.get(namespace) {
            return Ok(Arc::clone(generator));
        }

        let config = self.config_for(namespace);
        let distributor = StoreSegmentDistributor::new(
            namespace,
            config.step,
            Arc::clone(&self.store),
            self.time.clone(),
        )?;
        let generator = Arc::new(SegmentChainId::with_pool(distributor, config, &self.pool)?);
        generators.insert(namespace.to_owned(), Arc::clone(&generator));
        info!(namespace, step = config.step, "generator created");
        Ok(generator)
    }

    /// Shorthand for `self.generator(namespace)?.next_id()`.
    pub fn next_id(&self, namespace: &str) -> Result<u64> {
        self.generator(namespace)?.next_id()
    }

    /// Drops `namespace`'s generator from the registry, retires its prefetch
    /// job, and takes the job off its worker. Outstanding handles keep
    /// working in foreground-only mode. Returns `false` if there was no
    /// generator.
    pub fn retire(&self, namespace: &str) -> bool {
        let Some(generator) = self.generators.write().remove(namespace) else {
            return false;
        };
        generator.job().retire();
        let job: Arc<dyn AffinityJob> = generator.job().clone();
        self.pool.remove(&job);
        info!(namespace, "generator retired");
        true
    }

    /// Namespaces with a live generator, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<_> = self.generators.read().keys().cloned().collect();
        namespaces.sort_unstable();
        namespaces
    }
}
