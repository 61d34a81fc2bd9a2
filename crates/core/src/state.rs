//! Access state machine
//!
//! Owns the current [`AccessState`], the persisted "suspended" flag and the
//! re-entrancy guard. Navigation goes through the injected [`Navigator`];
//! UI layers observe changes through [`AccessStateMachine::subscribe`].

use crate::policy::{same_surface, RoleRedirectPolicy, SuspendBehavior};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessState {
    /// No confirmed status yet
    #[default]
    Unknown,
    Active,
    Suspended,
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessState::Unknown => write!(f, "unknown"),
            AccessState::Active => write!(f, "active"),
            AccessState::Suspended => write!(f, "suspended"),
        }
    }
}

/// What triggered a suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    /// The local expiry timer fired
    TimerExpired,
    /// A status poll reported no active subscription
    PollInactive,
    /// A response carried an expiry denial
    Denied,
}

impl fmt::Display for SuspendReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspendReason::TimerExpired => write!(f, "timer expired"),
            SuspendReason::PollInactive => write!(f, "poll inactive"),
            SuspendReason::Denied => write!(f, "request denied"),
        }
    }
}

/// The routing layer.
pub trait Navigator {
    fn current_surface(&self) -> String;
    fn navigate_to(&mut self, surface: &str);
}

/// Persistent key/value slot for the cross-reload "suspended" flag.
pub trait FlagStore {
    fn load_suspended(&self) -> bool;
    fn store_suspended(&mut self, suspended: bool) -> std::io::Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryFlagStore {
    suspended: bool,
}

impl MemoryFlagStore {
    pub fn new(suspended: bool) -> Self {
        Self { suspended }
    }
}

impl FlagStore for MemoryFlagStore {
    fn load_suspended(&self) -> bool {
        self.suspended
    }

    fn store_suspended(&mut self, suspended: bool) -> std::io::Result<()> {
        self.suspended = suspended;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Already in the requested state and on the right surface
    Unchanged,
    /// Dropped by the re-entrancy guard
    Suppressed,
    Suspended {
        navigated_to: Option<String>,
        notify_server: bool,
    },
    /// Exempt role: access kept, user kept on (or returned to) home
    Exempted { navigated_to: Option<String> },
    Activated { navigated_to: Option<String> },
}

pub struct AccessStateMachine<N: Navigator, S: FlagStore> {
    state: AccessState,
    role: String,
    policy: RoleRedirectPolicy,
    navigator: N,
    store: S,
    guard_window: Duration,
    /// Invariant: while `now < transitioning_until`, a second transition
    /// towards `guard_target` is suppressed.
    transitioning_until: Option<DateTime<Utc>>,
    guard_target: Option<AccessState>,
    observers: Vec<Sender<AccessState>>,
}

impl<N: Navigator, S: FlagStore> AccessStateMachine<N, S> {
    /// Starts `Unknown`, or `Suspended` if a previous session persisted the flag.
    pub fn new(
        role: impl Into<String>,
        policy: RoleRedirectPolicy,
        navigator: N,
        store: S,
        guard_window: Duration,
    ) -> Self {
        let role = role.into();
        let exempt = policy.behavior_for(&role) == SuspendBehavior::Exempt;
        let state = if store.load_suspended() && !exempt {
            AccessState::Suspended
        } else {
            AccessState::Unknown
        };
        Self {
            state,
            role,
            policy,
            navigator,
            store,
            guard_window,
            transitioning_until: None,
            guard_target: None,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> AccessState {
        self.state
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn behavior(&self) -> SuspendBehavior {
        self.policy.behavior_for(&self.role)
    }

    pub fn policy(&self) -> &RoleRedirectPolicy {
        &self.policy
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut N {
        &mut self.navigator
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_transitioning(&self, now: DateTime<Utc>) -> bool {
        self.transitioning_until.is_some_and(|until| now < until)
    }

    /// Moves to `Suspended`, or keeps an exempt role active on its home surface.
    pub fn suspend(&mut self, reason: SuspendReason, now: DateTime<Utc>) -> Transition {
        let behavior = self.behavior();

        if behavior == SuspendBehavior::Exempt {
            if self.guarded(AccessState::Active, now) {
                return Transition::Suppressed;
            }
            let was = self.state;
            self.persist(false);
            self.set_state(AccessState::Active);
            let navigated_to = self.return_home_if_gated();
            if was == AccessState::Active && navigated_to.is_none() {
                return Transition::Unchanged;
            }
            self.hold_guard(AccessState::Active, now);
            info!(role = %self.role, %reason, "exempt role kept active");
            return Transition::Exempted { navigated_to };
        }

        if self.guarded(AccessState::Suspended, now) {
            return Transition::Suppressed;
        }

        let was = self.state;
        self.persist(true);
        self.set_state(AccessState::Suspended);

        let navigated_to = match self.policy.suspend_target(behavior) {
            Some(target) => {
                let target = target.to_string();
                self.navigate_unless_there(&target)
            }
            None => None,
        };

        if was == AccessState::Suspended && navigated_to.is_none() {
            return Transition::Unchanged;
        }
        self.hold_guard(AccessState::Suspended, now);
        info!(role = %self.role, %reason, %behavior, "access suspended");
        Transition::Suspended {
            navigated_to,
            notify_server: behavior.notifies_server(),
        }
    }

    /// Moves to `Active`. Only call this on a confirmed status.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Transition {
        if self.guarded(AccessState::Active, now) {
            return Transition::Suppressed;
        }

        let was = self.state;
        if was != AccessState::Active {
            self.persist(false);
        }
        self.set_state(AccessState::Active);
        let navigated_to = self.return_home_if_gated();

        if was == AccessState::Active && navigated_to.is_none() {
            return Transition::Unchanged;
        }
        self.hold_guard(AccessState::Active, now);
        info!(role = %self.role, "access active");
        Transition::Activated { navigated_to }
    }

    /// Receives every subsequent state change.
    pub fn subscribe(&mut self) -> Receiver<AccessState> {
        let (tx, rx) = channel();
        self.observers.push(tx);
        rx
    }

    pub fn detach_observers(&mut self) {
        self.observers.clear();
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // ── Internals ───────────────────────────────────────────────

    fn guarded(&mut self, target: AccessState, now: DateTime<Utc>) -> bool {
        match self.transitioning_until {
            Some(until) if now < until => self.guard_target == Some(target),
            Some(_) => {
                self.transitioning_until = None;
                self.guard_target = None;
                false
            }
            None => false,
        }
    }

    fn hold_guard(&mut self, target: AccessState, now: DateTime<Utc>) {
        self.transitioning_until = Some(now + self.guard_window);
        self.guard_target = Some(target);
    }

    fn set_state(&mut self, next: AccessState) {
        if self.state == next {
            return;
        }
        self.state = next;
        self.observers.retain(|tx| tx.send(next).is_ok());
    }

    fn persist(&mut self, suspended: bool) {
        if let Err(e) = self.store.store_suspended(suspended) {
            warn!(error = %e, suspended, "could not persist suspended flag");
        }
    }

    fn navigate_unless_there(&mut self, target: &str) -> Option<String> {
        if same_surface(&self.navigator.current_surface(), target) {
            return None;
        }
        self.navigator.navigate_to(target);
        Some(target.to_string())
    }

    fn return_home_if_gated(&mut self) -> Option<String> {
        let current = self.navigator.current_surface();
        if !self.policy.surfaces().is_gated(&current) {
            return None;
        }
        let home = self.policy.home_for(&self.role).to_string();
        self.navigate_unless_there(&home)
    }
}
