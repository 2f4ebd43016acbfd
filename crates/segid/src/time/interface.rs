use std::sync::Arc;

/// A trait for time sources that return a wall-clock timestamp in whole
/// seconds.
///
/// Segments are stamped with the second they were reserved and compared
/// against it to decide expiry, so second resolution is all `segid` needs.
/// This abstraction allows you to plug in the cached system clock or a
/// mocked time source in tests.
///
/// # Example
///
/// ```
/// use segid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_secs(&self) -> u64 {
///         1234
///     }
/// }
///
/// let time = FixedTime;
/// assert_eq!(time.current_secs(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in seconds since the Unix epoch.
    fn current_secs(&self) -> u64;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn current_secs(&self) -> u64 {
        (**self).current_secs()
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn current_secs(&self) -> u64 {
        (**self).current_secs()
    }
}
