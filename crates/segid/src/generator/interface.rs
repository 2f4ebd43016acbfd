use crate::Result;
use std::sync::Arc;

/// A source of unique, per-namespace identifiers.
///
/// Ids from one generator are unique across every process sharing its
/// backing store and strictly increasing in issuance order within a single
/// calling thread. They are not globally ordered across threads, and
/// abandoned ranges leave gaps.
pub trait SegmentIdGenerator {
    /// The namespace this generator issues ids for.
    fn namespace(&self) -> &str;

    /// Returns the next id.
    ///
    /// # Errors
    ///
    /// Fails when a new range is needed right now and the backing store
    /// cannot provide one.
    fn next_id(&self) -> Result<u64>;
}

impl<G: SegmentIdGenerator + ?Sized> SegmentIdGenerator for Arc<G> {
    fn namespace(&self) -> &str {
        (**self).namespace()
    }

    fn next_id(&self) -> Result<u64> {
        (**self).next_id()
    }
}
