//! Interval pacing for archive submissions.
//!
//! Save Page Now allows 12 captures per minute for an authenticated user.
//! [`Pacer`] hands out one permit per interval; the first permit is one
//! interval after the pacer is created. Time comes from a [`Clock`] so the
//! schedule can be driven without real waiting.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use sitearchiver_shared::{Result, SiteArchiverError};
use tracing::debug;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of time and sleeping for the pacer.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Sleep for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

impl<C: Clock> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

/// Wall-clock time through `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Virtual clock that only moves when slept on or advanced by hand.
///
/// Sleeping returns immediately and records the requested duration.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    state: Mutex<ManualState>,
}

#[derive(Debug, Default)]
struct ManualState {
    elapsed: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    /// Start a virtual clock at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(ManualState::default()),
        }
    }

    /// Move time forward without recording a sleep (e.g. a slow request).
    pub fn advance(&self, duration: Duration) {
        self.lock().elapsed += duration;
    }

    /// Total virtual time since creation.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    /// Sum of all requested sleeps.
    pub fn total_slept(&self) -> Duration {
        self.lock().sleeps.iter().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.lock().elapsed
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        {
            let mut state = self.lock();
            state.elapsed += duration;
            state.sleeps.push(duration);
        }
        std::future::ready(())
    }
}

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

/// Grants one send permit per interval.
///
/// Permits are spaced from the previous permit, not from the end of the
/// previous request, so a slow request shortens the following wait.
#[derive(Debug)]
pub struct Pacer<C = TokioClock> {
    clock: C,
    interval: Duration,
    next_permit: Instant,
}

/// Check that `interval` can be scheduled from the current instant.
///
/// Returns a config error for intervals too large to represent as a deadline.
pub fn check_interval(interval: Duration) -> Result<()> {
    permit_after(Instant::now(), interval).map(|_| ())
}

fn permit_after(from: Instant, interval: Duration) -> Result<Instant> {
    from.checked_add(interval).ok_or_else(|| {
        SiteArchiverError::config(format!(
            "submission interval of {}s is too large",
            interval.as_secs()
        ))
    })
}

impl Pacer<TokioClock> {
    /// Pacer on wall-clock time.
    pub fn with_interval(interval: Duration) -> Result<Self> {
        Self::new(TokioClock, interval)
    }
}

impl<C: Clock> Pacer<C> {
    /// Create a pacer whose first permit is one `interval` from now.
    pub fn new(clock: C, interval: Duration) -> Result<Self> {
        let next_permit = permit_after(clock.now(), interval)?;
        Ok(Self {
            clock,
            interval,
            next_permit,
        })
    }

    /// Spacing between permits.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the next permitted send time, then claim it.
    pub async fn wait(&mut self) {
        let now = self.clock.now();
        if self.next_permit > now {
            let wait = self.next_permit - now;
            debug!(wait_ms = wait.as_millis() as u64, "waiting for next submission slot");
            self.clock.sleep(wait).await;
        }

        let granted = self.clock.now().max(self.next_permit);
        self.next_permit = granted.checked_add(self.interval).unwrap_or(granted);
    }
}
