/*!
 * Call scheduler guarding the language-model provider.
 *
 * Two limits apply at the same time:
 * - at most `max_concurrent` calls in flight
 * - at most `rpm_limit` call starts in any rolling window (60 seconds by default)
 *
 * Callers are admitted in FIFO order. Only the caller at the head of the queue
 * waits on the limits; everyone behind it waits on the fair admission lock.
 * One instance is shared (via `Arc`) by every task in the process.
 */

use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::time::Instant;

/// Default rolling window for the requests-per-minute limit
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Default slack added to computed window waits
pub const DEFAULT_MARGIN: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
struct LimiterState {
    in_flight: usize,
    starts: VecDeque<Instant>,
}

/// Concurrency and rolling-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    max_concurrent: usize,
    rpm_limit: Option<usize>,
    window: Duration,
    margin: Duration,
    state: Mutex<LimiterState>,
    admission: AsyncMutex<()>,
    slot_freed: Notify,
}

/// Decrements the in-flight count when a call settles (or is dropped)
struct InFlightGuard<'a> {
    limiter: &'a RateLimiter,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.limiter.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.limiter.slot_freed.notify_one();
    }
}

impl RateLimiter {
    /// Create a limiter; `rpm_limit` of `None` disables the window constraint
    pub fn new(max_concurrent: usize, rpm_limit: Option<u32>) -> Self {
        Self::with_window(max_concurrent, rpm_limit, DEFAULT_WINDOW, DEFAULT_MARGIN)
    }

    /// Create a limiter with a custom window and admission margin
    pub fn with_window(
        max_concurrent: usize,
        rpm_limit: Option<u32>,
        window: Duration,
        margin: Duration,
    ) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            rpm_limit: rpm_limit.filter(|&l| l > 0).map(|l| l as usize),
            window,
            margin,
            state: Mutex::new(LimiterState::default()),
            admission: AsyncMutex::new(()),
            slot_freed: Notify::new(),
        }
    }

    /// Number of calls currently running
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// Number of call starts still inside the rolling window
    pub fn starts_in_window(&self) -> usize {
        let mut state = self.state.lock();
        Self::prune(&mut state.starts, self.window, Instant::now());
        state.starts.len()
    }

    /// Run `task` once both limits allow it and return its result.
    ///
    /// Task errors are returned untouched; they never affect the limiter or
    /// other queued callers.
    pub async fn schedule<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.admit().await;
        task().await
    }

    async fn admit(&self) -> InFlightGuard<'_> {
        let _turn = self.admission.lock().await;

        loop {
            // Registered before the check so a completion between the check
            // and the await is not lost.
            let notified = self.slot_freed.notified();

            let wait = {
                let mut state = self.state.lock();
                if state.in_flight >= self.max_concurrent {
                    None
                } else {
                    let now = Instant::now();
                    Self::prune(&mut state.starts, self.window, now);

                    match (self.rpm_limit, state.starts.front()) {
                        (Some(limit), Some(&oldest)) if state.starts.len() >= limit => {
                            let elapsed = now.saturating_duration_since(oldest);
                            Some(self.window.saturating_sub(elapsed) + self.margin)
                        }
                        _ => {
                            state.starts.push_back(now);
                            state.in_flight += 1;
                            trace!(
                                "Admitted call ({} in flight, {} in window)",
                                state.in_flight,
                                state.starts.len()
                            );
                            return InFlightGuard { limiter: self };
                        }
                    }
                }
            };

            match wait {
                Some(delay) => {
                    debug!("Rate window full, waiting {:?} before next call", delay);
                    tokio::time::sleep(delay).await;
                }
                None => notified.await,
            }
        }
    }

    fn prune(starts: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while let Some(&oldest) = starts.front() {
            if now.saturating_duration_since(oldest) >= window {
                starts.pop_front();
            } else {
                break;
            }
        }
    }
}
