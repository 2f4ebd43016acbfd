/// A TTL that never elapses.
pub const TTL_FOREVER: u64 = u64::MAX;

/// Read-only view of a reserved, contiguous range of identifiers.
///
/// A segment covers the `step` consecutive ids ending at (and including)
/// `max_id`. It is stamped with the second it was reserved and stops issuing
/// once `ttl_secs` have elapsed, even if ids remain.
pub trait IdSegment {
    /// The largest id in the range (inclusive).
    fn max_id(&self) -> u64;

    /// The number of ids in the range.
    fn step(&self) -> u64;

    /// Wall-clock second at which the range was reserved.
    fn created_at_secs(&self) -> u64;

    /// How long the range may be used after reservation.
    fn ttl_secs(&self) -> u64;

    /// The smallest id in the range (inclusive).
    fn start_id(&self) -> u64 {
        self.max_id() - self.step() + 1
    }

    /// The first second at which the segment is expired.
    fn expires_at_secs(&self) -> u64 {
        self.created_at_secs().saturating_add(self.ttl_secs())
    }

    /// Returns `true` once the segment must no longer issue ids.
    fn is_expired(&self, now_secs: u64) -> bool {
        self.ttl_secs() != TTL_FOREVER && now_secs >= self.expires_at_secs()
    }

    /// Returns `true` if `id` falls inside this range.
    fn contains(&self, id: u64) -> bool {
        (self.start_id()..=self.max_id()).contains(&id)
    }
}
