use crate::{Error, IdSegment, Result, Segment};

/// A segment produced by reserving several base steps in one store call.
///
/// Behaves exactly like the [`Segment`] it wraps. `segments` records how many
/// base steps were folded together and is kept for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergedSegment {
    segments: u32,
    segment: Segment,
}

impl MergedSegment {
    /// Wraps `segment`, which spans `segments` base steps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `segments` is zero.
    pub fn new(segments: u32, segment: Segment) -> Result<Self> {
        if segments == 0 {
            return Err(Error::invalid_config("merged segment count must be greater than 0"));
        }
        Ok(Self { segments, segment })
    }

    /// The number of base steps this segment spans.
    pub const fn segments(&self) -> u32 {
        self.segments
    }

    /// The underlying range.
    pub const fn segment(&self) -> &Segment {
        &self.segment
    }
}

impl IdSegment for MergedSegment {
    fn max_id(&self) -> u64 {
        self.segment.max_id()
    }

    fn step(&self) -> u64 {
        self.segment.step()
    }

    fn created_at_secs(&self) -> u64 {
        self.segment.created_at_secs()
    }

    fn ttl_secs(&self) -> u64 {
        self.segment.ttl_secs()
    }
}
