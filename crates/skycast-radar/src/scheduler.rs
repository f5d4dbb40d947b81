//! Interval timers behind a small trait so playback can run on tokio in the
//! app and on a hand-driven clock in tests.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Callback fired on every interval tick.
pub type TickFn = Box<dyn FnMut() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Call `on_tick` every `period` until the returned handle is cancelled
    /// or dropped. The first tick fires one period after the call.
    fn start_interval(&self, period: Duration, on_tick: TickFn) -> IntervalHandle;
}

/// Owner of a running interval. Dropping it cancels the interval.
#[derive(Debug)]
pub struct IntervalHandle {
    token: CancellationToken,
}

impl IntervalHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for IntervalHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Runs intervals as tasks on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }

    /// Scheduler on the runtime of the calling task, if there is one.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn start_interval(&self, period: Duration, mut on_tick: TickFn) -> IntervalHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => on_tick(),
                }
            }
            tracing::trace!("Interval task stopped");
        });

        IntervalHandle::new(token)
    }
}

struct ManualTimer {
    period: Duration,
    elapsed: Duration,
    token: CancellationToken,
    on_tick: TickFn,
}

/// Scheduler whose time only moves through [`advance`](Self::advance).
/// Clones share the same timers.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    timers: Arc<Mutex<Vec<ManualTimer>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward, firing every tick that falls due.
    ///
    /// Tick callbacks run while the timer list is locked and must not start
    /// new intervals on this scheduler.
    pub fn advance(&self, by: Duration) {
        let mut timers = self.timers.lock();
        timers.retain(|t| !t.token.is_cancelled());
        for timer in timers.iter_mut() {
            if timer.period.is_zero() {
                continue;
            }
            timer.elapsed += by;
            while timer.elapsed >= timer.period && !timer.token.is_cancelled() {
                timer.elapsed -= timer.period;
                (timer.on_tick)();
            }
        }
    }

    /// Number of intervals that have not been cancelled.
    pub fn active_timers(&self) -> usize {
        self.timers
            .lock()
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .count()
    }
}

impl Scheduler for ManualScheduler {
    fn start_interval(&self, period: Duration, on_tick: TickFn) -> IntervalHandle {
        let token = CancellationToken::new();
        self.timers.lock().push(ManualTimer {
            period,
            elapsed: Duration::ZERO,
            token: token.clone(),
            on_tick,
        });
        IntervalHandle::new(token)
    }
}
