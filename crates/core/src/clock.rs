//! Local clock abstraction and server clock synchronization

use crate::timestamp::RawTimestamp;
use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

/// Source of local wall-clock time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The machine's wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A hand-driven clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(at)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.now.set(at);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Tracks `server − local` so "now" can be expressed in server time.
///
/// The offset is overwritten on every accepted server timestamp; the last
/// known good value wins. Before the first update it is zero.
#[derive(Debug, Clone)]
pub struct ClockSynchronizer {
    offset: Duration,
    last_applied_at: Option<DateTime<Utc>>,
}

impl Default for ClockSynchronizer {
    fn default() -> Self {
        Self {
            offset: Duration::zero(),
            last_applied_at: None,
        }
    }
}

impl ClockSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a server timestamp observed at the clock's current instant.
    ///
    /// Returns the new offset, or `None` (offset untouched) when the
    /// timestamp does not parse.
    pub fn update(&mut self, server: &RawTimestamp, clock: &dyn Clock) -> Option<Duration> {
        let server_now = server.to_utc()?;
        Some(self.update_at(server_now, clock.now()))
    }

    /// Sets the offset from a server instant and the local instant it was observed at.
    pub fn update_at(&mut self, server_now: DateTime<Utc>, local_now: DateTime<Utc>) -> Duration {
        self.offset = server_now - local_now;
        self.last_applied_at = Some(local_now);
        debug!(offset_ms = self.offset.num_milliseconds(), "clock offset updated");
        self.offset
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }

    /// Local instant at which the offset was last refreshed.
    pub fn last_applied_at(&self) -> Option<DateTime<Utc>> {
        self.last_applied_at
    }

    /// Authoritative now: local time corrected by the offset.
    pub fn now(&self, clock: &dyn Clock) -> DateTime<Utc> {
        clock.now() + self.offset
    }

    /// Converts a server-time instant to the local clock.
    pub fn to_local(&self, server_instant: DateTime<Utc>) -> DateTime<Utc> {
        server_instant - self.offset
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
