//! Error types for segment-chain ID allocation.
//!
//! Every fallible `segid` API returns [`Result`], whose error side is the
//! single [`Error`] enum below. The variants map onto four kinds of failure:
//!
//! - **Configuration**: [`Error::InvalidConfig`], [`Error::StepOverflow`],
//!   [`Error::MaxIdOverflow`]. Fatal and never retried.
//! - **Not found**: [`Error::NotFoundMaxId`]. The store has no row for the
//!   namespace and auto-creation is off. Surfaced to the first caller.
//! - **Transient**: [`Error::Store`]. Timeouts, connectivity, or write races
//!   in the backing store. Prefetch workers retry these on their next sweep.
//! - **Ordering anomaly**: [`Error::NextIdSegmentExpired`]. A freshly
//!   reserved segment would go backwards. The candidate is discarded.

/// A result type defaulting to the crate-wide [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `segid` can emit.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A namespace, segment, or pool was configured with an illegal value.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The store has no tracked maximum for the namespace and is not allowed
    /// to create one.
    #[error("no max id is tracked for namespace `{namespace}`")]
    NotFoundMaxId { namespace: String },

    /// The backing store failed to reserve a range.
    ///
    /// This is the only transient variant: see [`Error::is_transient`].
    #[error("store error for namespace `{namespace}`: {reason}")]
    Store { namespace: String, reason: String },

    /// A freshly reserved segment starts at or below the max id of the
    /// segment it would follow.
    #[error(
        "next segment for namespace `{namespace}` starts at {candidate_start_id}, \
         not after tail max id {tail_max_id}"
    )]
    NextIdSegmentExpired {
        namespace: String,
        tail_max_id: u64,
        candidate_start_id: u64,
    },

    /// `step * segments` does not fit in a `u64`.
    #[error("step {step} x {segments} segments overflows u64")]
    StepOverflow { step: u64, segments: u32 },

    /// Reserving `step` more ids would push the namespace's maximum past
    /// `u64::MAX`. Retrying can not succeed.
    #[error("max id {max_id} of namespace `{namespace}` + {step} overflows u64")]
    MaxIdOverflow {
        namespace: String,
        max_id: u64,
        step: u64,
    },

    /// A prefetch worker thread could not be spawned.
    #[error("failed to spawn prefetch worker `{worker}`: {reason}")]
    WorkerSpawn { worker: String, reason: String },

    /// Work was submitted after the prefetch workers were shut down.
    #[error("prefetch workers are shut down")]
    Shutdown,
}

impl Error {
    /// Returns `true` for errors worth retrying on the next prefetch sweep.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    /// Returns `true` when a reserved segment was rejected for going
    /// backwards.
    pub const fn is_ordering_anomaly(&self) -> bool {
        matches!(self, Self::NextIdSegmentExpired { .. })
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn store(namespace: &str, reason: impl ToString) -> Self {
        Self::Store {
            namespace: namespace.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn max_id_overflow(namespace: &str, max_id: u64, step: u64) -> Self {
        Self::MaxIdOverflow {
            namespace: namespace.to_owned(),
            max_id,
            step,
        }
    }

    pub(crate) fn not_found(namespace: &str) -> Self {
        Self::NotFoundMaxId {
            namespace: namespace.to_owned(),
        }
    }
}
