use crate::{CachedClock, Error, MaxIdStore, Result, SegmentDistributor, TimeSource};
use std::sync::Arc;
use tracing::trace;

/// A [`SegmentDistributor`] over any [`MaxIdStore`].
///
/// Many distributors (one per namespace) typically share one store through
/// the [`Arc`].
#[derive(Debug)]
pub struct StoreSegmentDistributor<S, T = CachedClock>
where
    S: MaxIdStore,
    T: TimeSource,
{
    namespace: String,
    step: u64,
    store: Arc<S>,
    time: T,
}

impl<S, T> StoreSegmentDistributor<S, T>
where
    S: MaxIdStore,
    T: TimeSource,
{
    /// Creates a distributor for `namespace` reserving `step` ids per base
    /// step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `namespace` is empty or `step` is
    /// zero.
    pub fn new(namespace: impl Into<String>, step: u64, store: Arc<S>, time: T) -> Result<Self> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(Error::invalid_config("namespace can not be empty"));
        }
        if step == 0 {
            return Err(Error::invalid_config(format!(
                "step for namespace `{namespace}` must be greater than 0"
            )));
        }
        Ok(Self {
            namespace,
            step,
            store,
            time,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S, T> SegmentDistributor for StoreSegmentDistributor<S, T>
where
    S: MaxIdStore,
    T: TimeSource + Send + Sync,
{
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn step(&self) -> u64 {
        self.step
    }

    fn now_secs(&self) -> u64 {
        self.time.current_secs()
    }

    fn reserve_max_id(&self, step: u64) -> Result<u64> {
        if step == 0 {
            return Err(Error::invalid_config("reserved step must be greater than 0"));
        }
        let max_id = self.store.reserve(&self.namespace, step)?;
        trace!(namespace = %self.namespace, step, max_id, "reserved");
        Ok(max_id)
    }
}
