use crate::{ChainNode, Error, MergedSegment, ReservedSegment, Result, Segment};
use std::sync::Arc;

/// The backing store that durably tracks the last reserved id per namespace.
///
/// This is the only boundary the allocation core depends on. Implementations
/// must make [`MaxIdStore::reserve`] a single atomic transition of the
/// stored value (never read-then-write from the caller), because uniqueness
/// across every process sharing the store rests on it.
pub trait MaxIdStore: Send + Sync {
    /// Atomically adds `step` to the namespace's tracked maximum and returns
    /// the new maximum.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFoundMaxId`] if the namespace is not tracked and the
    ///   store does not create namespaces on demand.
    /// - [`Error::MaxIdOverflow`] if the new maximum does not fit in a `u64`.
    /// - [`Error::Store`] for transient failures.
    fn reserve(&self, namespace: &str, step: u64) -> Result<u64>;

    /// Starts tracking `namespace` at `initial_max_id`.
    ///
    /// Returns `false`, leaving the stored maximum untouched, if the
    /// namespace already exists.
    fn create(&self, namespace: &str, initial_max_id: u64) -> Result<bool>;

    /// The namespace's tracked maximum, if any.
    fn current(&self, namespace: &str) -> Result<Option<u64>>;
}

impl<S: MaxIdStore + ?Sized> MaxIdStore for Arc<S> {
    fn reserve(&self, namespace: &str, step: u64) -> Result<u64> {
        (**self).reserve(namespace, step)
    }

    fn create(&self, namespace: &str, initial_max_id: u64) -> Result<bool> {
        (**self).create(namespace, initial_max_id)
    }

    fn current(&self, namespace: &str) -> Result<Option<u64>> {
        (**self).current(namespace)
    }
}

/// Per-namespace policy that turns "I need more ids" into a store
/// reservation.
///
/// Implementors provide the namespace, the base step, the current cached
/// second, and [`SegmentDistributor::reserve_max_id`]. Everything else is
/// derived.
pub trait SegmentDistributor: Send + Sync {
    /// Stable name of the logical sequence.
    fn namespace(&self) -> &str;

    /// Base allocation batch size. Always greater than zero.
    fn step(&self) -> u64;

    /// The cached wall-clock second used to stamp new segments.
    fn now_secs(&self) -> u64;

    /// Atomically raises the namespace's maximum by `step` and returns the
    /// new maximum.
    fn reserve_max_id(&self, step: u64) -> Result<u64>;

    /// `step * segments`, overflow-checked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StepOverflow`] if the product does not fit in a
    /// `u64`.
    fn step_for(&self, segments: u32) -> Result<u64> {
        self.step()
            .checked_mul(u64::from(segments))
            .ok_or(Error::StepOverflow {
                step: self.step(),
                segments,
            })
    }

    /// Reserves one base step.
    fn next_segment(&self, ttl_secs: u64) -> Result<ReservedSegment> {
        let step = self.step();
        let max_id = self.reserve_max_id(step)?;
        let segment = reserved_segment(self.namespace(), max_id, step, self.now_secs(), ttl_secs)?;
        Ok(segment.into())
    }

    /// Reserves `segments` base steps in one call.
    ///
    /// A single step yields a [`ReservedSegment::Plain`], anything more a
    /// [`ReservedSegment::Merged`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if `segments` is zero.
    /// - [`Error::NextIdSegmentExpired`] if the store hands back a maximum
    ///   too small to hold the requested range.
    /// - Any error of [`SegmentDistributor::reserve_max_id`].
    fn next_segments(&self, segments: u32, ttl_secs: u64) -> Result<ReservedSegment> {
        match segments {
            0 => Err(Error::invalid_config("segments must be greater than 0")),
            1 => self.next_segment(ttl_secs),
            _ => {
                let total_step = self.step_for(segments)?;
                let max_id = self.reserve_max_id(total_step)?;
                let segment = reserved_segment(
                    self.namespace(),
                    max_id,
                    total_step,
                    self.now_secs(),
                    ttl_secs,
                )?;
                Ok(MergedSegment::new(segments, segment)?.into())
            }
        }
    }

    /// Reserves a segment and wraps it in the node that follows `previous`.
    ///
    /// The node is only a candidate: installing it into a chain still checks
    /// that it starts after the chain's tail. A maximum too small for the
    /// range is reported against `previous`.
    fn next_chain_node(
        &self,
        previous: Option<&Arc<ChainNode>>,
        segments: u32,
        ttl_secs: u64,
    ) -> Result<Arc<ChainNode>> {
        let segment = self
            .next_segments(segments, ttl_secs)
            .map_err(|e| match (e, previous) {
                (
                    Error::NextIdSegmentExpired {
                        namespace,
                        candidate_start_id,
                        ..
                    },
                    Some(previous),
                ) => Error::NextIdSegmentExpired {
                    namespace,
                    tail_max_id: previous.max_id(),
                    candidate_start_id,
                },
                (e, _) => e,
            })?;
        let node = match previous {
            Some(previous) => ChainNode::after(previous, segment),
            None => ChainNode::root(segment),
        };
        Ok(Arc::new(node))
    }
}

/// Builds the segment ending at a freshly reserved `max_id`.
///
/// A maximum below `step` leaves no room for a range of positive ids, so the
/// store went backwards. Reported as an ordering anomaly clamped at id 0.
fn reserved_segment(
    namespace: &str,
    max_id: u64,
    step: u64,
    created_at_secs: u64,
    ttl_secs: u64,
) -> Result<Segment> {
    if max_id < step {
        return Err(Error::NextIdSegmentExpired {
            namespace: namespace.to_owned(),
            tail_max_id: 0,
            candidate_start_id: 0,
        });
    }
    Segment::new(max_id, step, created_at_secs, ttl_secs)
}

impl<D: SegmentDistributor + ?Sized> SegmentDistributor for Arc<D> {
    fn namespace(&self) -> &str {
        (**self).namespace()
    }

    fn step(&self) -> u64 {
        (**self).step()
    }

    fn now_secs(&self) -> u64 {
        (**self).now_secs()
    }

    fn reserve_max_id(&self, step: u64) -> Result<u64> {
        (**self).reserve_max_id(step)
    }
}
