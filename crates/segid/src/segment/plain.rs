use crate::{Error, IdSegment, Result};
use core::fmt;

/// An immutable range of `step` ids ending at `max_id`, as returned by a
/// single store reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    max_id: u64,
    step: u64,
    created_at_secs: u64,
    ttl_secs: u64,
}

impl Segment {
    /// Creates a segment covering `max_id - step + 1 ..= max_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `step` or `ttl_secs` is zero, or
    /// if `max_id < step` (the range would start at or below zero).
    pub fn new(max_id: u64, step: u64, created_at_secs: u64, ttl_secs: u64) -> Result<Self> {
        if step == 0 {
            return Err(Error::invalid_config("segment step must be greater than 0"));
        }
        if ttl_secs == 0 {
            return Err(Error::invalid_config("segment ttl must be greater than 0"));
        }
        if max_id < step {
            return Err(Error::invalid_config(format!(
                "segment max id {max_id} is smaller than its step {step}"
            )));
        }
        Ok(Self {
            max_id,
            step,
            created_at_secs,
            ttl_secs,
        })
    }
}

impl IdSegment for Segment {
    fn max_id(&self) -> u64 {
        self.max_id
    }

    fn step(&self) -> u64 {
        self.step
    }

    fn created_at_secs(&self) -> u64 {
        self.created_at_secs
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..={}]", self.start_id(), self.max_id)
    }
}
