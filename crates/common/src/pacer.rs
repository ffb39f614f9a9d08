//! Adaptive rate limiting for remote calls.
//!
//! A [`Pacer`] is a single-slot rate limiter with exponential backoff: each
//! retryable failure doubles the sleep before the next attempt (capped at a
//! maximum), and each success decays it back toward the minimum. Workers that
//! run in parallel each draw a pacer from a [`PacerPool`] so that one slow
//! transfer does not inflate the backoff state of the others.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default control-plane pacing: the server sometimes reflects changes slowly.
pub const CONTROL_MIN_SLEEP: Duration = Duration::from_millis(200);
/// Upper bound for control-plane backoff.
pub const CONTROL_MAX_SLEEP: Duration = Duration::from_secs(2);
/// Retry budget for control-plane calls and post-mutation reads.
pub const CONTROL_MAX_ATTEMPTS: u32 = 10;

/// Minimum sleep between transfer-worker retries.
pub const WORKER_MIN_SLEEP: Duration = Duration::from_millis(20);
/// Upper bound for transfer-worker backoff.
pub const WORKER_MAX_SLEEP: Duration = Duration::from_millis(500);
/// Retry budget for a single part transfer.
pub const WORKER_MAX_ATTEMPTS: u32 = 3;

/// Backoff decay applied after a successful call.
const DECAY_CONSTANT: u32 = 2;

/// Outcome of a single paced attempt.
///
/// The closure passed to [`Pacer::call`] classifies its own result: `Retry`
/// consumes retry budget and sleeps, `Fatal` returns immediately.
pub enum Attempt<T, E> {
    /// The call succeeded with a value.
    Done(T),
    /// The call failed but may succeed if repeated.
    Retry(E),
    /// The call failed and repeating it cannot help.
    Fatal(E),
}

/// A single-slot rate limiter with adaptive exponential backoff.
pub struct Pacer {
    min_sleep: Duration,
    max_sleep: Duration,
    max_attempts: u32,
    sleep: Mutex<Duration>,
}

impl Pacer {
    /// Create a pacer with explicit bounds.
    ///
    /// # Arguments
    /// * `min_sleep` - Initial and lower-bound sleep between retries
    /// * `max_sleep` - Upper-bound sleep between retries
    /// * `max_attempts` - Total attempts before the last error is surfaced
    pub fn new(min_sleep: Duration, max_sleep: Duration, max_attempts: u32) -> Self {
        Self {
            min_sleep,
            max_sleep,
            max_attempts: max_attempts.max(1),
            sleep: Mutex::new(min_sleep),
        }
    }

    /// Pacer for control-plane calls (directory mutations, searches).
    pub fn control() -> Self {
        Self::new(CONTROL_MIN_SLEEP, CONTROL_MAX_SLEEP, CONTROL_MAX_ATTEMPTS)
    }

    /// Pacer for a single upload or download worker.
    pub fn worker() -> Self {
        Self::new(WORKER_MIN_SLEEP, WORKER_MAX_SLEEP, WORKER_MAX_ATTEMPTS)
    }

    /// Invoke `f` until it resolves to [`Attempt::Done`] or the retry budget
    /// is exhausted, sleeping the adaptive interval between retries.
    ///
    /// Cancellation follows tokio semantics: dropping the returned future
    /// aborts any pending sleep or in-flight attempt.
    pub async fn call<T, E, F, Fut>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match f().await {
                Attempt::Done(value) => {
                    self.decay();
                    return Ok(value);
                }
                Attempt::Fatal(err) => return Err(err),
                Attempt::Retry(err) => {
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    let pause: Duration = self.bump();
                    tracing::debug!(attempt, ?pause, "pacing retry");
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }

    /// Restore the backoff interval to its minimum.
    pub fn reset(&self) {
        *self.sleep.lock().unwrap() = self.min_sleep;
    }

    /// Current sleep interval (observable for tests).
    pub fn current_sleep(&self) -> Duration {
        *self.sleep.lock().unwrap()
    }

    /// Return the current interval and double it for the next failure.
    fn bump(&self) -> Duration {
        let mut sleep = self.sleep.lock().unwrap();
        let current: Duration = *sleep;
        *sleep = (current * 2).min(self.max_sleep);
        current
    }

    /// Shrink the interval after a success.
    fn decay(&self) {
        let mut sleep = self.sleep.lock().unwrap();
        *sleep = (*sleep / DECAY_CONSTANT).max(self.min_sleep);
    }
}

/// A fixed set of independent pacers, selected by index.
///
/// Upload schedulers draw one pacer per part number so concurrent parts
/// rarely share backoff state; the pool size is scaled above the worker
/// count for that reason.
pub struct PacerPool {
    pacers: Vec<Arc<Pacer>>,
}

impl PacerPool {
    /// Create a pool of `count` worker pacers (at least one).
    pub fn workers(count: usize) -> Self {
        let pacers: Vec<Arc<Pacer>> = (0..count.max(1))
            .map(|_| Arc::new(Pacer::worker()))
            .collect();
        Self { pacers }
    }

    /// Pick the pacer for slot `index` (wraps around the pool).
    pub fn get(&self, index: usize) -> Arc<Pacer> {
        Arc::clone(&self.pacers[index % self.pacers.len()])
    }

    /// Number of pacers in the pool.
    pub fn len(&self) -> usize {
        self.pacers.len()
    }

    /// Whether the pool is empty (never true; pools hold at least one pacer).
    pub fn is_empty(&self) -> bool {
        self.pacers.is_empty()
    }
}
