use crate::{ChainNode, Error, Result};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;
use tracing::debug;

/// Observable state of a [`SegmentChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainState {
    /// Nothing reserved yet.
    Empty,
    /// A current segment is being consumed and no next segment is ready.
    Active,
    /// A next segment is ready for cutover.
    Prefetched,
}

#[derive(Debug, Default)]
struct Slots {
    current: Option<Arc<ChainNode>>,
    next: Option<Arc<ChainNode>>,
}

/// Double buffer of the segment being consumed and the one prefetched to
/// replace it.
///
/// Readers clone the `current` node under a shared lock and then issue from
/// it without holding any lock. Installing and cutting over take the lock
/// exclusively, so a reader always sees either the pre- or post-cutover
/// node.
///
/// Every reservation-and-install for the namespace, whether from the
/// prefetch worker or a blocked foreground caller, runs under
/// [`SegmentChain::lock_fill`]. At most one reservation is in flight per
/// chain.
#[derive(Debug)]
pub struct SegmentChain {
    namespace: String,
    slots: RwLock<Slots>,
    fill: Mutex<()>,
}

impl SegmentChain {
    /// Creates an empty chain for `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            slots: RwLock::new(Slots::default()),
            fill: Mutex::new(()),
        }
    }

    /// The namespace this chain serves.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn state(&self) -> ChainState {
        let slots = self.slots.read();
        match (&slots.current, &slots.next) {
            (None, _) => ChainState::Empty,
            (Some(_), None) => ChainState::Active,
            (Some(_), Some(_)) => ChainState::Prefetched,
        }
    }

    /// The node currently being consumed.
    pub fn current(&self) -> Option<Arc<ChainNode>> {
        self.slots.read().current.clone()
    }

    /// The prefetched node, if one is ready.
    pub fn next(&self) -> Option<Arc<ChainNode>> {
        self.slots.read().next.clone()
    }

    /// The newest node in the chain: `next` if present, else `current`.
    pub fn tail(&self) -> Option<Arc<ChainNode>> {
        let slots = self.slots.read();
        slots.next.clone().or_else(|| slots.current.clone())
    }

    /// Installs a freshly reserved node.
    ///
    /// - `EMPTY`: the node becomes `current`.
    /// - `ACTIVE`: the node becomes `next`, provided it starts strictly after
    ///   `current` ends.
    /// - `PREFETCHED`: nothing happens and `false` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NextIdSegmentExpired`] when the candidate would go
    /// backwards. The candidate is dropped and the chain is unchanged.
    pub fn install(&self, candidate: Arc<ChainNode>) -> Result<bool> {
        let mut slots = self.slots.write();
        let tail_max_id = match (&slots.current, &slots.next) {
            (None, _) => {
                debug!(
                    namespace = %self.namespace,
                    version = candidate.version(),
                    segment = %candidate.segment(),
                    "install current"
                );
                slots.current = Some(candidate);
                return Ok(true);
            }
            (Some(_), Some(_)) => return Ok(false),
            (Some(current), None) => current.max_id(),
        };

        if candidate.start_id() <= tail_max_id {
            return Err(Error::NextIdSegmentExpired {
                namespace: self.namespace.clone(),
                tail_max_id,
                candidate_start_id: candidate.start_id(),
            });
        }

        debug!(
            namespace = %self.namespace,
            version = candidate.version(),
            segment = %candidate.segment(),
            "install next"
        );
        slots.next = Some(candidate);
        Ok(true)
    }

    /// Promotes `next` to `current`, if `current` is still the node with
    /// `observed_version` and a next node is ready.
    ///
    /// Only one cutover can succeed per exhausted node. Late callers that
    /// observed an already replaced node get `false` and should re-read
    /// [`SegmentChain::current`].
    pub fn cutover(&self, observed_version: u64) -> bool {
        let mut slots = self.slots.write();
        let observed = slots
            .current
            .as_ref()
            .is_some_and(|current| current.version() == observed_version);
        if !observed || slots.next.is_none() {
            return false;
        }
        slots.current = slots.next.take();
        debug!(
            namespace = %self.namespace,
            from = observed_version,
            to = slots.current.as_ref().map(|node| node.version()),
            "cutover"
        );
        true
    }

    /// Serializes reservations for this chain.
    pub fn lock_fill(&self) -> MutexGuard<'_, ()> {
        self.fill.lock()
    }
}
