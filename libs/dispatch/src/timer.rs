//! Per-service cycle timers.
//!
//! One timer per service that declared a period. The timer list's mutex is
//! also the scan gate: a scan that finds it held is skipped outright, so
//! timer delivery is best-effort under contention but a due timer fires
//! exactly once per scan pass that observes it.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use types::{Envelope, ServiceId};

#[derive(Debug)]
struct CycleTimer {
    period: Duration,
    /// Armed at dispatcher start; `None` means not yet armed.
    next_due: Option<Instant>,
    /// Reusable tick message, cloned per fire.
    tick: Envelope,
}

#[derive(Debug, Default)]
pub(crate) struct CycleScheduler {
    timers: Mutex<Vec<CycleTimer>>,
}

impl CycleScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record a timer for `sid`. Pre-start only, like registration.
    pub(crate) fn register(&self, sid: ServiceId, period: Duration) {
        self.timers.lock().push(CycleTimer {
            period,
            next_due: None,
            tick: Envelope::tick(sid, period),
        });
    }

    /// Arm every timer one period after `now`.
    pub(crate) fn arm(&self, now: Instant) {
        for timer in self.timers.lock().iter_mut() {
            timer.next_due = Some(now + timer.period);
        }
    }

    /// One scan pass: fire every due timer once and advance it by exactly
    /// one period (a timer that missed several periods catches up one
    /// scan at a time instead of bursting). Returns the fire count; a
    /// scan already in progress makes this a no-op.
    pub(crate) fn scan(&self, now: Instant, mut fire: impl FnMut(Envelope)) -> usize {
        let Some(mut timers) = self.timers.try_lock() else {
            trace!("timer scan already in progress, skipping");
            return 0;
        };
        let mut fired = 0;
        for timer in timers.iter_mut() {
            let Some(due) = timer.next_due else { continue };
            if due <= now {
                fire(timer.tick.clone());
                timer.next_due = Some(due + timer.period);
                fired += 1;
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{kinds, Body};

    const PERIOD: Duration = Duration::from_millis(100);

    fn fired_ids(sched: &CycleScheduler, now: Instant) -> Vec<ServiceId> {
        let mut ids = Vec::new();
        sched.scan(now, |tick| ids.push(tick.dest));
        ids
    }

    #[test]
    fn fires_once_per_elapsed_period() {
        let sched = CycleScheduler::new();
        sched.register(7, PERIOD);
        let start = Instant::now();
        sched.arm(start);

        assert!(fired_ids(&sched, start).is_empty());
        assert_eq!(fired_ids(&sched, start + PERIOD), vec![7]);
        // Same instant again: already advanced, nothing due.
        assert!(fired_ids(&sched, start + PERIOD).is_empty());
        assert_eq!(fired_ids(&sched, start + 2 * PERIOD), vec![7]);
    }

    #[test]
    fn stall_catches_up_one_period_per_scan() {
        let sched = CycleScheduler::new();
        sched.register(7, PERIOD);
        let start = Instant::now();
        sched.arm(start);

        // Ten periods pass without a scan; each subsequent scan fires the
        // timer exactly once, never a burst.
        let stalled = start + 10 * PERIOD;
        for _ in 0..5 {
            assert_eq!(fired_ids(&sched, stalled).len(), 1);
        }
    }

    #[test]
    fn unarmed_timers_never_fire() {
        let sched = CycleScheduler::new();
        sched.register(7, PERIOD);
        assert!(fired_ids(&sched, Instant::now() + 10 * PERIOD).is_empty());
    }

    #[test]
    fn concurrent_scan_is_skipped() {
        let sched = CycleScheduler::new();
        sched.register(7, PERIOD);
        let start = Instant::now();
        sched.arm(start);

        let guard = sched.timers.lock();
        assert_eq!(sched.scan(start + PERIOD, |_| {}), 0);
        drop(guard);
        assert_eq!(sched.scan(start + PERIOD, |_| {}), 1);
    }

    #[test]
    fn tick_envelope_is_self_addressed() {
        let sched = CycleScheduler::new();
        sched.register(9, PERIOD);
        let start = Instant::now();
        sched.arm(start);
        let mut ticks = Vec::new();
        sched.scan(start + PERIOD, |tick| ticks.push(tick));
        let tick = &ticks[0];
        assert_eq!(tick.src, 9);
        assert_eq!(tick.dest, 9);
        assert_eq!(tick.kind, kinds::CYCLE_TICK);
        assert!(matches!(tick.body, Body::Tick { period } if period == PERIOD));
    }
}
