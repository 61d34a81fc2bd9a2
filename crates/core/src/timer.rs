//! Single expiry timer
//!
//! At most one timer is ever pending. Arming always disposes the previous
//! timer first, and every arming gets a fresh generation number, so a
//! disposed timer can never fire.
//!
//! Expiries beyond the platform's single-timer cap are not scheduled
//! directly: a short re-evaluation timer is pended instead, and each time it
//! elapses the remaining time is recomputed until it fits under the cap.

use crate::clock::{Clock, ClockSynchronizer};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Largest delay a single platform timer accepts (2^31 − 1 ms, ~24.9 days).
pub const MAX_TIMER_DELAY_MS: i64 = 2_147_483_647;

/// Default cadence of re-evaluation while an expiry is beyond the cap.
pub const DEFAULT_REEVALUATE_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Fires the expiry transition
    Expiry,
    /// Recomputes the remaining time; the expiry is still beyond the cap
    Reevaluate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub generation: u64,
    pub kind: TimerKind,
    /// When the timer elapses, on the local clock
    pub due_local: DateTime<Utc>,
    /// The expiry instant being tracked, in server time
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// Already past due; the caller runs the expiry transition now
    Due,
    Armed { due_local: DateTime<Utc> },
    Deferred { recheck_local: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Expired { expiry: DateTime<Utc> },
}

#[derive(Debug)]
pub struct TimerScheduler {
    pending: Option<PendingTimer>,
    generation: u64,
    max_delay: Duration,
    reevaluate_every: Duration,
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new(
            Duration::milliseconds(MAX_TIMER_DELAY_MS),
            Duration::seconds(DEFAULT_REEVALUATE_SECS),
        )
    }
}

impl TimerScheduler {
    pub fn new(max_delay: Duration, reevaluate_every: Duration) -> Self {
        Self {
            pending: None,
            generation: 0,
            max_delay,
            reevaluate_every,
        }
    }

    /// Schedules the expiry transition for `expiry` (server time).
    pub fn arm(
        &mut self,
        expiry: DateTime<Utc>,
        sync: &ClockSynchronizer,
        clock: &dyn Clock,
    ) -> ArmOutcome {
        self.disarm();
        self.schedule(expiry, sync, clock)
    }

    /// Cancels the pending timer. Returns whether one was pending.
    pub fn disarm(&mut self) -> bool {
        match self.pending.take() {
            Some(timer) => {
                debug!(generation = timer.generation, "timer disarmed");
                true
            }
            None => false,
        }
    }

    /// Runs the pending timer if it has elapsed.
    ///
    /// An elapsed re-evaluation re-pends itself (or the real timer) and yields
    /// nothing unless the expiry turns out to be already due. An elapsed expiry
    /// timer is checked against authoritative time once more, so an offset
    /// refreshed since arming is honoured.
    pub fn poll_due(&mut self, sync: &ClockSynchronizer, clock: &dyn Clock) -> Option<TimerEvent> {
        let timer = self.pending?;
        if clock.now() < timer.due_local {
            return None;
        }
        self.pending = None;

        match self.schedule(timer.expiry, sync, clock) {
            ArmOutcome::Due => {
                debug!(generation = timer.generation, expiry = %timer.expiry, "timer fired");
                Some(TimerEvent::Expired {
                    expiry: timer.expiry,
                })
            }
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&PendingTimer> {
        self.pending.as_ref()
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Local instant the pending timer elapses at.
    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.pending.map(|t| t.due_local)
    }

    fn schedule(
        &mut self,
        expiry: DateTime<Utc>,
        sync: &ClockSynchronizer,
        clock: &dyn Clock,
    ) -> ArmOutcome {
        let remaining = expiry - sync.now(clock);
        if remaining <= Duration::zero() {
            return ArmOutcome::Due;
        }

        self.generation += 1;
        if remaining > self.max_delay {
            let recheck_local = clock.now() + self.reevaluate_every;
            self.pending = Some(PendingTimer {
                generation: self.generation,
                kind: TimerKind::Reevaluate,
                due_local: recheck_local,
                expiry,
            });
            debug!(
                remaining_secs = remaining.num_seconds(),
                "expiry beyond timer cap; re-evaluating later"
            );
            return ArmOutcome::Deferred { recheck_local };
        }

        let due_local = sync.to_local(expiry);
        self.pending = Some(PendingTimer {
            generation: self.generation,
            kind: TimerKind::Expiry,
            due_local,
            expiry,
        });
        debug!(generation = self.generation, due = %due_local, "expiry timer armed");
        ArmOutcome::Armed { due_local }
    }
}
