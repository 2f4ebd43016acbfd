//! Configuration for prefetch workers and per-namespace segments.
//!
//! [`PoolConfig`] sizes and paces the background workers shared by every
//! namespace. [`SegmentConfig`] describes one namespace: how wide a segment
//! is, how long it lives, and how aggressively to prefetch the next one.

use crate::{Error, Result, TTL_FOREVER};
use core::time::Duration;

/// Default sweep interval of a prefetch worker.
pub const DEFAULT_PREFETCH_PERIOD: Duration = Duration::from_secs(1);

/// Default time [`PrefetchWorkerPool::stop`] waits for in-flight sweeps.
///
/// [`PrefetchWorkerPool::stop`]: crate::PrefetchWorkerPool::stop
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Default number of ids reserved per base step.
pub const DEFAULT_STEP: u64 = 100;

/// Default number of base steps reserved when nothing is hungry.
pub const DEFAULT_SAFE_DISTANCE: u32 = 1;

/// Default consumed share (percent) of a segment that wakes its worker.
pub const DEFAULT_PREFETCH_THRESHOLD: u8 = 50;

/// Upper bound for the adaptive prefetch distance, in base steps.
pub const MAX_PREFETCH_DISTANCE: u32 = 1 << 16;

/// Settings for a [`PrefetchWorkerPool`].
///
/// [`PrefetchWorkerPool`]: crate::PrefetchWorkerPool
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// How long a worker parks between sweeps when nobody wakes it.
    #[cfg_attr(feature = "serde", serde(with = "duration_millis"))]
    pub prefetch_period: Duration,

    /// Number of prefetch workers (one OS thread each).
    pub core_pool_size: usize,

    /// Stop the pool automatically when it is dropped.
    pub shutdown_hook: bool,

    /// How long `stop()` waits for in-flight sweeps. Zero means don't wait.
    #[cfg_attr(feature = "serde", serde(with = "duration_millis"))]
    pub shutdown_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            prefetch_period: DEFAULT_PREFETCH_PERIOD,
            core_pool_size: num_cpus::get(),
            shutdown_hook: true,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the pool has no workers or the
    /// prefetch period is zero.
    pub fn validate(&self) -> Result<()> {
        if self.core_pool_size == 0 {
            return Err(Error::invalid_config("core_pool_size must be greater than 0"));
        }
        if self.prefetch_period.is_zero() {
            return Err(Error::invalid_config("prefetch_period must be greater than 0"));
        }
        Ok(())
    }
}

/// Settings for one namespace's segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SegmentConfig {
    /// Ids reserved per base step.
    pub step: u64,

    /// Seconds a segment may issue ids after it was reserved.
    pub ttl_secs: u64,

    /// Base steps reserved by a prefetch when the namespace is not hungry,
    /// and by a blocked foreground caller.
    pub safe_distance: u32,

    /// Consumed share of the current segment, in percent, at which the
    /// namespace's worker is woken to prefetch.
    pub prefetch_threshold: u8,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            ttl_secs: TTL_FOREVER,
            safe_distance: DEFAULT_SAFE_DISTANCE,
            prefetch_threshold: DEFAULT_PREFETCH_THRESHOLD,
        }
    }
}

impl SegmentConfig {
    /// Default settings with the given step.
    pub fn with_step(step: u64) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if any field is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(Error::invalid_config("step must be greater than 0"));
        }
        if self.ttl_secs == 0 {
            return Err(Error::invalid_config("ttl_secs must be greater than 0"));
        }
        if self.safe_distance == 0 || self.safe_distance > MAX_PREFETCH_DISTANCE {
            return Err(Error::invalid_config(format!(
                "safe_distance must be within 1..={MAX_PREFETCH_DISTANCE}"
            )));
        }
        if self.prefetch_threshold == 0 || self.prefetch_threshold > 100 {
            return Err(Error::invalid_config(
                "prefetch_threshold must be within 1..=100",
            ));
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod duration_millis {
    use core::time::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PoolConfig::default().validate().is_ok());
        assert!(SegmentConfig::default().validate().is_ok());
        assert_eq!(PoolConfig::default().core_pool_size, num_cpus::get());
    }

    #[test]
    fn pool_config_rejects_zero_values() {
        let config = PoolConfig {
            core_pool_size: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig { .. })));

        let config = PoolConfig {
            prefetch_period: Duration::ZERO,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn segment_config_rejects_out_of_range_values() {
        let base = SegmentConfig::with_step(10);
        for bad in [
            SegmentConfig { step: 0, ..base },
            SegmentConfig { ttl_secs: 0, ..base },
            SegmentConfig { safe_distance: 0, ..base },
            SegmentConfig {
                safe_distance: MAX_PREFETCH_DISTANCE + 1,
                ..base
            },
            SegmentConfig {
                prefetch_threshold: 0,
                ..base
            },
            SegmentConfig {
                prefetch_threshold: 101,
                ..base
            },
        ] {
            assert!(bad.validate().is_err(), "{bad:?} should be rejected");
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn configs_round_trip_through_json_with_millisecond_durations() {
        let pool = PoolConfig {
            prefetch_period: Duration::from_millis(250),
            core_pool_size: 2,
            shutdown_hook: false,
            shutdown_timeout: Duration::ZERO,
        };
        let json = serde_json::to_string(&pool).unwrap();
        assert!(json.contains("\"prefetch_period\":250"));
        assert_eq!(serde_json::from_str::<PoolConfig>(&json).unwrap(), pool);

        let segment: SegmentConfig = serde_json::from_str(r#"{"step":1000}"#).unwrap();
        assert_eq!(segment, SegmentConfig::with_step(1000));
    }
}
