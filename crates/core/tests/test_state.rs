//! Tests for the access state machine and role redirect policy

use accessgate_core::testing::RecordingNavigator;
use accessgate_core::{
    AccessState, AccessStateMachine, FlagStore, MemoryFlagStore, RoleRedirectPolicy,
    SuspendBehavior, SuspendReason, Surfaces, Transition,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn t0() -> DateTime<Utc> {
    utc("2024-01-01T00:00:00Z")
}

fn machine(role: &str, suspended_flag: bool) -> AccessStateMachine<RecordingNavigator, MemoryFlagStore> {
    AccessStateMachine::new(
        role,
        RoleRedirectPolicy::default(),
        RecordingNavigator::new("/dashboard"),
        MemoryFlagStore::new(suspended_flag),
        Duration::seconds(1),
    )
}

#[test]
fn test_starts_unknown_without_flag() {
    assert_eq!(machine("staff", false).state(), AccessState::Unknown);
}

#[test]
fn test_persisted_flag_restores_suspended() {
    let m = machine("staff", true);
    assert_eq!(m.state(), AccessState::Suspended);
    assert!(m.navigator().history().is_empty(), "fast paint does not navigate");
}

#[test]
fn test_lockout_role_suspension() {
    let mut m = machine("staff", false);
    let t = m.suspend(SuspendReason::PollInactive, t0());
    assert_eq!(
        t,
        Transition::Suspended {
            navigated_to: Some("/subscription-expired".to_string()),
            notify_server: false,
        }
    );
    assert_eq!(m.state(), AccessState::Suspended);
    assert!(m.store().load_suspended());
}

#[test]
fn test_owner_goes_to_renewal_and_notifies() {
    let mut m = machine("owner", false);
    let t = m.suspend(SuspendReason::TimerExpired, t0());
    assert_eq!(
        t,
        Transition::Suspended {
            navigated_to: Some("/billing/renew".to_string()),
            notify_server: true,
        }
    );
}

#[test]
fn test_exempt_role_never_locked_out() {
    let mut m = machine("superadmin", true);
    assert_eq!(m.state(), AccessState::Unknown, "flag ignored for exempt role");

    let t = m.suspend(SuspendReason::PollInactive, t0());
    assert_eq!(t, Transition::Exempted { navigated_to: None });
    assert_eq!(m.state(), AccessState::Active);
    assert!(m.navigator().history().is_empty());
    assert!(!m.store().load_suspended());
}

#[test]
fn test_exempt_role_returned_home_from_lockout() {
    let mut m = machine("superadmin", false);
    m.navigator_mut().visit("/subscription-expired");
    let t = m.suspend(SuspendReason::Denied, t0());
    assert_eq!(
        t,
        Transition::Exempted {
            navigated_to: Some("/dashboard".to_string())
        }
    );
}

#[test]
fn test_no_navigation_when_already_on_target() {
    let mut m = machine("staff", false);
    m.navigator_mut().visit("/subscription-expired/");
    let t = m.suspend(SuspendReason::Denied, t0());
    assert_eq!(
        t,
        Transition::Suspended {
            navigated_to: None,
            notify_server: false,
        }
    );
    assert!(m.navigator().history().is_empty());
}

#[test]
fn test_guard_suppresses_near_simultaneous_signals() {
    let mut m = machine("staff", false);
    m.suspend(SuspendReason::TimerExpired, t0());
    // User wanders off before the poll response lands in the same tick.
    m.navigator_mut().visit("/dashboard");
    let t = m.suspend(SuspendReason::PollInactive, t0() + Duration::milliseconds(10));
    assert_eq!(t, Transition::Suppressed);
    assert!(m.is_transitioning(t0() + Duration::milliseconds(10)));
    assert_eq!(m.navigator().history().len(), 1);
}

#[test]
fn test_guard_self_clears() {
    let mut m = machine("staff", false);
    m.suspend(SuspendReason::TimerExpired, t0());
    m.navigator_mut().visit("/dashboard");

    let later = t0() + Duration::seconds(2);
    assert!(!m.is_transitioning(later));
    let t = m.suspend(SuspendReason::PollInactive, later);
    assert!(matches!(t, Transition::Suspended { navigated_to: Some(_), .. }));
    assert_eq!(m.navigator().history().len(), 2);
}

#[test]
fn test_guard_does_not_block_opposite_transition() {
    let mut m = machine("staff", false);
    m.activate(t0());
    let t = m.suspend(SuspendReason::PollInactive, t0() + Duration::milliseconds(5));
    assert!(matches!(t, Transition::Suspended { .. }));
    assert_eq!(m.state(), AccessState::Suspended);
}

#[test]
fn test_repeat_suspend_is_unchanged() {
    let mut m = machine("staff", false);
    m.suspend(SuspendReason::PollInactive, t0());
    let t = m.suspend(SuspendReason::PollInactive, t0() + Duration::seconds(30));
    assert_eq!(t, Transition::Unchanged);
    assert_eq!(m.navigator().history().len(), 1);
}

#[test]
fn test_activate_clears_flag_and_leaves_lockout() {
    let mut m = machine("staff", true);
    m.navigator_mut().visit("/subscription-expired");
    let t = m.activate(t0());
    assert_eq!(
        t,
        Transition::Activated {
            navigated_to: Some("/dashboard".to_string())
        }
    );
    assert_eq!(m.state(), AccessState::Active);
    assert!(!m.store().load_suspended());
}

#[test]
fn test_activate_does_not_move_user_elsewhere() {
    let mut m = machine("staff", false);
    m.navigator_mut().visit("/documents/42");
    let t = m.activate(t0());
    assert_eq!(t, Transition::Activated { navigated_to: None });
    assert!(m.navigator().history().is_empty());
}

#[test]
fn test_observers_receive_changes() {
    let mut m = machine("staff", false);
    let rx = m.subscribe();
    m.activate(t0());
    m.suspend(SuspendReason::Denied, t0() + Duration::seconds(5));
    m.suspend(SuspendReason::Denied, t0() + Duration::seconds(10));

    let seen: Vec<AccessState> = rx.try_iter().collect();
    assert_eq!(seen, vec![AccessState::Active, AccessState::Suspended]);
}

#[test]
fn test_dropped_observers_are_pruned() {
    let mut m = machine("staff", false);
    let rx = m.subscribe();
    let _keep = m.subscribe();
    drop(rx);
    m.activate(t0());
    assert_eq!(m.observer_count(), 1);
}

#[test]
fn test_custom_role_table() {
    let behaviors: HashMap<String, SuspendBehavior> = [
        ("Accountant".to_string(), SuspendBehavior::RenewAndNotify),
        ("auditor".to_string(), SuspendBehavior::Exempt),
    ]
    .into_iter()
    .collect();
    let mut surfaces = Surfaces::default();
    surfaces
        .home
        .insert("AUDITOR".to_string(), "/audit".to_string());
    let policy = RoleRedirectPolicy::new(behaviors, SuspendBehavior::Lockout, surfaces);

    assert_eq!(policy.behavior_for("accountant"), SuspendBehavior::RenewAndNotify);
    assert_eq!(policy.behavior_for("auditor"), SuspendBehavior::Exempt);
    assert_eq!(policy.behavior_for("intern"), SuspendBehavior::Lockout);
    assert_eq!(policy.home_for("Auditor"), "/audit");
    assert_eq!(policy.home_for("intern"), "/dashboard");
    assert_eq!(policy.suspend_target(SuspendBehavior::Exempt), None);
}
