use crate::TimeSource;
use core::time::Duration;
use portable_atomic::{AtomicU64, Ordering};
use std::{
    sync::{Arc, LazyLock, OnceLock},
    thread::{self, JoinHandle},
    time::{Instant, SystemTime, UNIX_EPOCH},
};

const CLOCK_TICK_MILLIS: u64 = 10;

/// How often the ticker thread refreshes the cached value.
pub const CLOCK_TICK: Duration = Duration::from_millis(CLOCK_TICK_MILLIS);

static GLOBAL_CACHED_CLOCK: LazyLock<CachedClock> = LazyLock::new(CachedClock::new);

/// Shared ticker thread state.
#[derive(Debug)]
struct SharedTickerInner {
    elapsed_millis: AtomicU64,
    _handle: OnceLock<JoinHandle<()>>,
}

/// A coarse wall-clock time source whose value is maintained by a background
/// ticker thread.
///
/// Segment creation and expiry checks sit on the ID issuance hot path, so the
/// clock must not cost a syscall per read. Instead, one thread advances a
/// shared atomic every [`CLOCK_TICK`] and readers perform a single relaxed
/// load.
///
/// The reported time is the wall-clock millisecond captured at construction
/// plus the monotonic time elapsed since then, so it never goes backwards even
/// if the system clock is adjusted.
///
/// Clones share the same ticker. The ticker exits once the last clone is
/// dropped.
#[derive(Clone, Debug)]
pub struct CachedClock {
    inner: Arc<SharedTickerInner>,
    start_unix_millis: u64,
}

impl Default for CachedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl CachedClock {
    /// Constructs a cached clock backed by a fresh ticker thread.
    ///
    /// Prefer [`CachedClock::global`] unless you need an isolated ticker.
    ///
    /// # Panics
    ///
    /// Panics if:
    ///
    /// - The current system time is earlier than the Unix epoch
    /// - The ticker thread cannot be spawned
    pub fn new() -> Self {
        let start = Instant::now();
        let start_unix_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("System clock before UNIX_EPOCH")
            .as_millis() as u64;

        let inner = Arc::new(SharedTickerInner {
            elapsed_millis: AtomicU64::new(0),
            _handle: OnceLock::new(),
        });

        let weak_inner = Arc::downgrade(&inner);
        let handle = thread::Builder::new()
            .name("segid-clock".into())
            .spawn(move || {
                let mut tick: u64 = 1;

                loop {
                    // Compute the absolute target time of the next tick
                    let target = start + Duration::from_millis(tick * CLOCK_TICK_MILLIS);

                    // Sleep if we are early
                    let now = Instant::now();
                    if now < target {
                        thread::sleep(target - now);
                    }

                    // Upgrade only after sleeping so the last clone can drop
                    // while we wait.
                    let Some(inner_ref) = weak_inner.upgrade() else {
                        break;
                    };

                    let elapsed = start.elapsed().as_millis() as u64;
                    inner_ref.elapsed_millis.store(elapsed, Ordering::Relaxed);

                    // Align to the next tick after the current actual time
                    tick = elapsed / CLOCK_TICK_MILLIS + 1;
                }
            })
            .expect("failed to spawn clock ticker thread");

        inner
            ._handle
            .set(handle)
            .expect("failed to set thread handle");

        Self {
            inner,
            start_unix_millis,
        }
    }

    /// Returns the process-wide shared clock.
    pub fn global() -> Self {
        GLOBAL_CACHED_CLOCK.clone()
    }

    /// Returns the cached time in milliseconds since the Unix epoch.
    pub fn current_millis(&self) -> u64 {
        self.start_unix_millis + self.inner.elapsed_millis.load(Ordering::Relaxed)
    }
}

impl TimeSource for CachedClock {
    fn current_secs(&self) -> u64 {
        self.current_millis() / 1000
    }
}
