use crate::{IdSegment, ReservedSegment};
use portable_atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Outcome of asking a [`ChainNode`] for its next id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// A unique id from this node's range.
    Issued {
        /// The issued id.
        id: u64,
    },
    /// Every id in the range has been handed out.
    Exhausted,
    /// The segment's TTL elapsed. Remaining ids must not be used.
    Expired,
}

/// One reserved segment plus its consumption cursor.
///
/// Issuance is a single `fetch_add` on the cursor, so concurrent callers
/// never observe the same offset and never leave the range: offsets at or
/// past `step` report [`Allocation::Exhausted`].
///
/// Each node keeps a weak link to the node it was built after. The link is
/// for diagnostics only and never keeps older segments alive.
#[derive(Debug)]
pub struct ChainNode {
    version: u64,
    segment: ReservedSegment,
    #[cfg(feature = "cache-padded")]
    cursor: crossbeam_utils::CachePadded<AtomicU64>,
    #[cfg(not(feature = "cache-padded"))]
    cursor: AtomicU64,
    threshold_signaled: AtomicBool,
    previous: Weak<ChainNode>,
}

impl ChainNode {
    /// Creates the first node of a namespace's chain (version 0).
    pub fn root(segment: ReservedSegment) -> Self {
        Self::with_version(0, segment, Weak::new())
    }

    /// Creates the node that follows `previous`.
    pub fn after(previous: &Arc<Self>, segment: ReservedSegment) -> Self {
        Self::with_version(previous.version + 1, segment, Arc::downgrade(previous))
    }

    fn with_version(version: u64, segment: ReservedSegment, previous: Weak<Self>) -> Self {
        Self {
            version,
            segment,
            #[cfg(feature = "cache-padded")]
            cursor: crossbeam_utils::CachePadded::new(AtomicU64::new(0)),
            #[cfg(not(feature = "cache-padded"))]
            cursor: AtomicU64::new(0),
            threshold_signaled: AtomicBool::new(false),
            previous,
        }
    }

    /// Position of this node in its chain. Strictly increasing per namespace.
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// The reserved range this node issues from.
    pub const fn segment(&self) -> &ReservedSegment {
        &self.segment
    }

    /// The node this one was built after, if it is still alive.
    pub fn previous(&self) -> Option<Arc<Self>> {
        self.previous.upgrade()
    }

    /// Issues the next id, unless the segment is exhausted or expired at
    /// `now_secs`.
    #[inline]
    pub fn try_next(&self, now_secs: u64) -> Allocation {
        if self.segment.is_expired(now_secs) {
            return Allocation::Expired;
        }
        let offset = self.cursor.fetch_add(1, Ordering::Relaxed);
        if offset >= self.segment.step() {
            return Allocation::Exhausted;
        }
        Allocation::Issued {
            id: self.segment.start_id() + offset,
        }
    }

    /// Returns `true` while the node can still issue at `now_secs`.
    pub fn has_capacity(&self, now_secs: u64) -> bool {
        !self.segment.is_expired(now_secs) && self.remaining() > 0
    }

    /// Number of ids handed out so far.
    pub fn consumed(&self) -> u64 {
        self.cursor.load(Ordering::Relaxed).min(self.segment.step())
    }

    /// Number of ids still available, ignoring expiry.
    pub fn remaining(&self) -> u64 {
        self.segment.step() - self.consumed()
    }

    /// Consumed share of the range in whole percent (0..=100).
    pub fn consumed_percent(&self) -> u8 {
        let percent = u128::from(self.consumed()) * 100 / u128::from(self.segment.step());
        percent as u8
    }

    /// Claims the one-shot "prefetch threshold crossed" signal for this node.
    ///
    /// Returns `true` for exactly one caller.
    pub fn claim_threshold_signal(&self) -> bool {
        !self.threshold_signaled.swap(true, Ordering::AcqRel)
    }

    /// Shorthand for `self.segment().start_id()`.
    pub fn start_id(&self) -> u64 {
        self.segment.start_id()
    }

    /// Shorthand for `self.segment().max_id()`.
    pub fn max_id(&self) -> u64 {
        self.segment.max_id()
    }
}
