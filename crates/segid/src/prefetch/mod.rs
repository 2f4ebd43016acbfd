//! Background prefetching.
//!
//! A [`PrefetchWorkerPool`] owns a fixed set of [`PrefetchWorker`] threads.
//! Each [`AffinityJob`] is pinned to exactly one worker, chosen by hashing
//! its job id, so a namespace's prefetches never run concurrently with each
//! other and never migrate between threads.

mod job;
mod pool;
mod worker;

pub use job::*;
pub use pool::*;
pub use worker::*;
