use crate::{IdSegment, MergedSegment, Segment};
use core::fmt;

/// A segment as handed out by a [`SegmentDistributor`]: either a single base
/// step or several merged together.
///
/// [`SegmentDistributor`]: crate::SegmentDistributor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReservedSegment {
    /// One base step.
    Plain(Segment),
    /// Several base steps reserved in a single call.
    Merged(MergedSegment),
}

impl ReservedSegment {
    /// The number of base steps this segment spans.
    pub const fn segments(&self) -> u32 {
        match self {
            Self::Plain(_) => 1,
            Self::Merged(merged) => merged.segments(),
        }
    }

    /// Returns `true` for [`ReservedSegment::Merged`].
    pub const fn is_merged(&self) -> bool {
        matches!(self, Self::Merged(_))
    }

    const fn inner(&self) -> &Segment {
        match self {
            Self::Plain(segment) => segment,
            Self::Merged(merged) => merged.segment(),
        }
    }
}

impl IdSegment for ReservedSegment {
    fn max_id(&self) -> u64 {
        self.inner().max_id()
    }

    fn step(&self) -> u64 {
        self.inner().step()
    }

    fn created_at_secs(&self) -> u64 {
        self.inner().created_at_secs()
    }

    fn ttl_secs(&self) -> u64 {
        self.inner().ttl_secs()
    }
}

impl From<Segment> for ReservedSegment {
    fn from(segment: Segment) -> Self {
        Self::Plain(segment)
    }
}

impl From<MergedSegment> for ReservedSegment {
    fn from(merged: MergedSegment) -> Self {
        Self::Merged(merged)
    }
}

impl fmt::Display for ReservedSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(segment) => write!(f, "{segment}"),
            Self::Merged(merged) => write!(f, "{}x{}", merged.segment(), merged.segments()),
        }
    }
}
