//! The access engine — wires the gate's components into one session
//!
//! Flow:
//! 1. `start`: install the interceptor, verify a returning checkout, poll once
//! 2. every poll feeds the clock offset and the expiry, then drives the state machine
//! 3. an active verdict (re)arms the timer; its firing suspends access
//! 4. any response carrying an expiry denial suspends access immediately
//! 5. `stop` (or drop) disarms the timer and releases the interceptor
//!
//! The engine is driven from a single event loop: call [`AccessEngine::handle`]
//! for UI events and ticks, and sleep until [`AccessEngine::next_wakeup`].

use crate::api;
use crate::clock::{Clock, ClockSynchronizer};
use crate::config::GateConfig;
use crate::error::GateError;
use crate::expiry::Expiry;
use crate::interceptor::{Outbound, RequestInterceptor};
use crate::model::StatusResponse;
use crate::poller::{PollTicket, PollTrigger, PollVerdict, StatusPoller};
use crate::state::{
    AccessState, AccessStateMachine, FlagStore, Navigator, SuspendReason, Transition,
};
use crate::timer::{ArmOutcome, TimerEvent, TimerScheduler};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use chrono::{DateTime, Duration, Utc};
use std::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

/// The signed-in user, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Periodic wake-up: runs due timers and interval polls
    Tick,
    Focus,
    VisibilityRegained,
    RouteChanged(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Applied(PollVerdict),
    /// Superseded by a newer response
    Stale,
    /// Network or decode failure; state left as it was
    Failed,
}

pub struct AccessEngine<T, N, S, C>
where
    T: Transport,
    N: Navigator,
    S: FlagStore,
    C: Clock,
{
    config: GateConfig,
    identity: Identity,
    transport: T,
    clock: C,
    sync: ClockSynchronizer,
    timer: TimerScheduler,
    poller: StatusPoller,
    interceptor: RequestInterceptor,
    machine: AccessStateMachine<N, S>,
    expiry: Option<Expiry>,
    expire_ack_sent: bool,
    running: bool,
}

impl<T, N, S, C> AccessEngine<T, N, S, C>
where
    T: Transport,
    N: Navigator,
    S: FlagStore,
    C: Clock,
{
    pub fn new(
        config: GateConfig,
        identity: Identity,
        transport: T,
        navigator: N,
        store: S,
        clock: C,
    ) -> Self {
        let timing = &config.timing;
        let timer = TimerScheduler::new(timing.max_timer_delay(), timing.reevaluate_every());
        let poller = StatusPoller::new(timing.poll_interval());
        let interceptor = RequestInterceptor::new(
            &config.interceptor.allowlist,
            &config.interceptor.denial_messages,
        );
        let machine = AccessStateMachine::new(
            identity.role.clone(),
            config.policy(),
            navigator,
            store,
            timing.guard_window(),
        );
        Self {
            config,
            identity,
            transport,
            clock,
            sync: ClockSynchronizer::new(),
            timer,
            poller,
            interceptor,
            machine,
            expiry: None,
            expire_ack_sent: false,
            running: false,
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Starts the session. A `checkout_session` returned from a payment
    /// redirect is verified before the first status check.
    pub fn start(&mut self, checkout_session: Option<&str>) {
        if self.running {
            return;
        }
        self.running = true;
        self.interceptor.start();
        self.poller.start(self.clock.now());
        info!(
            user = %self.identity.user_id,
            role = %self.identity.role,
            state = %self.machine.state(),
            "access gate started"
        );

        if let Some(session_id) = checkout_session {
            self.verify_checkout(session_id);
        }
        self.check_status(PollTrigger::Startup);
    }

    /// Tears the session down: timer disarmed, interceptor released,
    /// offset forgotten, observers detached. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.timer.disarm();
        self.interceptor.stop();
        self.poller.reset();
        self.sync.reset();
        self.machine.detach_observers();
        self.expiry = None;
        info!(user = %self.identity.user_id, "access gate stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // ── Events ──────────────────────────────────────────────────

    pub fn handle(&mut self, event: EngineEvent) {
        if !self.running {
            return;
        }
        match event {
            EngineEvent::Tick => self.tick(),
            EngineEvent::Focus => {
                self.check_status(PollTrigger::Focus);
            }
            EngineEvent::VisibilityRegained => {
                self.check_status(PollTrigger::VisibilityRegained);
            }
            EngineEvent::RouteChanged(path) => {
                debug!(%path, "route changed");
                self.check_status(PollTrigger::RouteChange);
            }
        }
    }

    /// Runs an elapsed timer and a due interval poll.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }
        if let Some(TimerEvent::Expired { expiry }) = self.timer.poll_due(&self.sync, &self.clock) {
            info!(%expiry, "expiry reached");
            self.suspend(SuspendReason::TimerExpired);
        }
        if self.poller.is_due(self.clock.now()) {
            self.check_status(PollTrigger::Interval);
        }
    }

    /// Earliest local instant at which `tick` has work to do.
    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        match (self.timer.next_wakeup(), self.poller.next_due()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ── Status polling ──────────────────────────────────────────

    /// Fetches status and reconciles. Failures are swallowed.
    pub fn check_status(&mut self, trigger: PollTrigger) -> PollOutcome {
        let ticket = self.begin_poll(trigger);
        match self.fetch_status() {
            Ok(status) => self.complete_poll(ticket, &status),
            Err(e) => {
                warn!(%trigger, error = %e, "status check failed; keeping current state");
                PollOutcome::Failed
            }
        }
    }

    /// Issues a ticket for a status request performed by the caller.
    pub fn begin_poll(&mut self, trigger: PollTrigger) -> PollTicket {
        self.poller.begin(trigger, self.clock.now())
    }

    /// Applies the status payload belonging to `ticket`.
    pub fn complete_poll(&mut self, ticket: PollTicket, status: &StatusResponse) -> PollOutcome {
        let verdict = match self
            .poller
            .evaluate(ticket, status, &mut self.sync, &self.clock)
        {
            Some(v) => v,
            None => return PollOutcome::Stale,
        };

        match verdict {
            PollVerdict::Inactive => {
                self.suspend(SuspendReason::PollInactive);
            }
            PollVerdict::Active { expiry } => self.apply_active(expiry),
        }
        PollOutcome::Applied(verdict)
    }

    fn fetch_status(&mut self) -> Result<StatusResponse, GateError> {
        let request = api::status_request(&self.config.api);
        let response = self.request(&request)?;
        api::parse_status(&request, &response)
    }

    fn apply_active(&mut self, expiry: Option<Expiry>) {
        self.expiry = expiry;
        match expiry {
            Some(e) => match self.timer.arm(e.instant, &self.sync, &self.clock) {
                ArmOutcome::Due => {
                    info!(expiry = %e.instant, source = %e.source, "expiry already passed");
                    self.suspend(SuspendReason::TimerExpired);
                }
                _ => {
                    self.machine.activate(self.clock.now());
                }
            },
            None => {
                self.timer.disarm();
                self.machine.activate(self.clock.now());
            }
        }
    }

    // ── Requests ────────────────────────────────────────────────

    /// Sends a request through the interceptor.
    ///
    /// While access is not active, non-allowlisted requests are answered
    /// locally. A response carrying an expiry denial suspends access before
    /// it is returned to the caller.
    pub fn request(&mut self, request: &HttpRequest) -> Result<HttpResponse, GateError> {
        if let Outbound::ShortCircuit(response) =
            self.interceptor.outbound(request, self.machine.state())
        {
            return Ok(response);
        }

        let response = self.transport.send(request)?;
        if self.interceptor.is_denial(&response) {
            info!(status = response.status, "expiry denial received");
            self.suspend(SuspendReason::Denied);
        }
        Ok(response)
    }

    /// Verifies a checkout session. Returns whether the backend accepted it.
    pub fn verify_checkout(&mut self, session_id: &str) -> bool {
        let request = api::checkout_verify_request(&self.config.api, session_id);
        match self
            .request(&request)
            .and_then(|resp| api::ensure_success(&request, &resp))
        {
            Ok(()) => {
                info!("checkout verified");
                true
            }
            Err(e) => {
                warn!(error = %e, "checkout verification failed");
                false
            }
        }
    }

    // ── Transitions ─────────────────────────────────────────────

    fn suspend(&mut self, reason: SuspendReason) {
        self.timer.disarm();
        let transition = self.machine.suspend(reason, self.clock.now());

        let notify = matches!(
            transition,
            Transition::Suspended {
                notify_server: true,
                ..
            }
        );
        if notify && reason == SuspendReason::TimerExpired && !self.expire_ack_sent {
            self.expire_ack_sent = true;
            let request = api::expire_now_request(&self.config.api);
            match self
                .request(&request)
                .and_then(|resp| api::ensure_success(&request, &resp))
            {
                Ok(()) => debug!("server acknowledged expiry"),
                Err(e) => warn!(error = %e, "expire-now request failed"),
            }
        }
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn state(&self) -> AccessState {
        self.machine.state()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn expiry(&self) -> Option<Expiry> {
        self.expiry
    }

    pub fn offset(&self) -> Duration {
        self.sync.offset()
    }

    /// Authoritative (server-corrected) now.
    pub fn server_now(&self) -> DateTime<Utc> {
        self.sync.now(&self.clock)
    }

    pub fn subscribe(&mut self) -> Receiver<AccessState> {
        self.machine.subscribe()
    }

    pub fn machine(&self) -> &AccessStateMachine<N, S> {
        &self.machine
    }

    pub fn navigator(&self) -> &N {
        self.machine.navigator()
    }

    pub fn navigator_mut(&mut self) -> &mut N {
        self.machine.navigator_mut()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn timer(&self) -> &TimerScheduler {
        &self.timer
    }

    pub fn interceptor(&self) -> &RequestInterceptor {
        &self.interceptor
    }
}

impl<T, N, S, C> Drop for AccessEngine<T, N, S, C>
where
    T: Transport,
    N: Navigator,
    S: FlagStore,
    C: Clock,
{
    fn drop(&mut self) {
        self.stop();
    }
}
