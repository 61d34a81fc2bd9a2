//! Status polling — schedule, ordering and verdicts
//!
//! The poller does not perform I/O itself: the engine begins a ticket, sends
//! the request, and hands the decoded payload back to [`StatusPoller::evaluate`].
//! Responses are applied in ticket order; one belonging to an older ticket than
//! the last applied one is dropped. `checked_at` only breaks ties between
//! responses to the same ticket, so a server clock stepping backwards never
//! stalls reconciliation.

use crate::clock::{Clock, ClockSynchronizer};
use crate::expiry::{Expiry, ExpiryComputer};
use crate::model::StatusResponse;
use crate::timestamp::RawTimestamp;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTrigger {
    Startup,
    Interval,
    Focus,
    VisibilityRegained,
    RouteChange,
    Manual,
}

impl fmt::Display for PollTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollTrigger::Startup => write!(f, "startup"),
            PollTrigger::Interval => write!(f, "interval"),
            PollTrigger::Focus => write!(f, "focus"),
            PollTrigger::VisibilityRegained => write!(f, "visibility"),
            PollTrigger::RouteChange => write!(f, "route"),
            PollTrigger::Manual => write!(f, "manual"),
        }
    }
}

/// Identifies one in-flight status request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    pub seq: u64,
    pub trigger: PollTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollVerdict {
    Inactive,
    /// `expiry` is `None` when indeterminate
    Active { expiry: Option<Expiry> },
}

#[derive(Debug)]
pub struct StatusPoller {
    interval: Duration,
    next_due: Option<DateTime<Utc>>,
    next_seq: u64,
    last_applied_seq: Option<u64>,
    last_checked_at: Option<DateTime<Utc>>,
    computer: ExpiryComputer,
}

impl StatusPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
            next_seq: 0,
            last_applied_seq: None,
            last_checked_at: None,
            computer: ExpiryComputer::new(),
        }
    }

    /// Starts the interval schedule.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.next_due = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.next_due
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_due.is_some_and(|due| now >= due)
    }

    /// Issues a ticket for a new status request.
    ///
    /// Any poll pushes the next interval poll a full interval out.
    pub fn begin(&mut self, trigger: PollTrigger, now: DateTime<Utc>) -> PollTicket {
        self.next_seq += 1;
        if self.next_due.is_some() {
            self.next_due = Some(now + self.interval);
        }
        debug!(seq = self.next_seq, %trigger, "status check");
        PollTicket {
            seq: self.next_seq,
            trigger,
        }
    }

    /// Applies a status payload: refreshes the clock offset and derives the verdict.
    ///
    /// Returns `None` when the response is stale.
    pub fn evaluate(
        &mut self,
        ticket: PollTicket,
        status: &StatusResponse,
        sync: &mut ClockSynchronizer,
        clock: &dyn Clock,
    ) -> Option<PollVerdict> {
        let checked_at = status.checked_at.as_ref().and_then(RawTimestamp::to_utc);
        match self.last_applied_seq {
            Some(last) if ticket.seq < last => {
                debug!(seq = ticket.seq, "dropping response from an older request");
                return None;
            }
            Some(last) if ticket.seq == last => {
                if let (Some(checked), Some(prev)) = (checked_at, self.last_checked_at) {
                    if checked < prev {
                        debug!(seq = ticket.seq, %checked, %prev, "dropping older duplicate response");
                        return None;
                    }
                }
            }
            _ => {}
        }

        self.last_applied_seq = Some(ticket.seq);
        self.last_checked_at = checked_at;
        if let Some(ts) = &status.checked_at {
            sync.update(ts, clock);
        }

        if !status.has_active_subscription {
            return Some(PollVerdict::Inactive);
        }
        let expiry = status
            .current_subscription
            .as_ref()
            .and_then(|sub| self.computer.compute(sub, None));
        Some(PollVerdict::Active { expiry })
    }

    /// Forgets ordering state; used on teardown.
    pub fn reset(&mut self) {
        self.next_due = None;
        self.last_applied_seq = None;
        self.last_checked_at = None;
    }
}
