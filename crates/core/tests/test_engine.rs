//! End-to-end scenarios for the access engine

use accessgate_core::testing::{RecordingNavigator, RecordingTransport};
use accessgate_core::{
    AccessEngine, AccessState, Clock, EngineEvent, GateConfig, HttpRequest, Identity,
    ManualClock, MemoryFlagStore, FlagStore, Navigator, PollOutcome, PollTrigger, PollVerdict, StatusResponse,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

type Engine = AccessEngine<RecordingTransport, RecordingNavigator, MemoryFlagStore, ManualClock>;

const STATUS: &str = "/api/subscriptions/status/";
const EXPIRE_NOW: &str = "/api/subscriptions/expire-now/";
const CHECKOUT_VERIFY: &str = "/api/payments/checkout/verify/";

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn engine_with(role: &str, clock: &ManualClock, flag: bool) -> Engine {
    AccessEngine::new(
        GateConfig::default(),
        Identity::new("user-1", role),
        RecordingTransport::new(),
        RecordingNavigator::new("/dashboard"),
        MemoryFlagStore::new(flag),
        clock.clone(),
    )
}

fn engine(role: &str, clock: &ManualClock) -> Engine {
    engine_with(role, clock, false)
}

fn active(checked_at: &str, created_at: &str, seconds: i64) -> Value {
    json!({
        "has_active_subscription": true,
        "checked_at": checked_at,
        "current_subscription": {
            "id": 1,
            "created_at": created_at,
            "plan": {"name": "Starter", "duration_in_seconds": seconds}
        }
    })
}

fn inactive(checked_at: &str) -> Value {
    json!({
        "has_active_subscription": false,
        "checked_at": checked_at,
        "current_subscription": null
    })
}

#[test]
fn test_timer_fires_at_server_time_expiry() {
    // Local clock is 5s behind the server.
    let clock = ManualClock::new(utc("2024-01-01T00:59:50Z"));
    let mut e = engine("staff", &clock);
    e.transport().respond_json(
        STATUS,
        200,
        active("2024-01-01T00:59:55Z", "2024-01-01T00:00:00", 3600),
    );

    e.start(None);
    assert_eq!(e.state(), AccessState::Active);
    assert_eq!(e.offset(), Duration::seconds(5));
    assert_eq!(e.expiry().unwrap().instant, utc("2024-01-01T01:00:00Z"));
    assert_eq!(e.next_wakeup(), Some(utc("2024-01-01T00:59:55Z")));

    clock.set(utc("2024-01-01T00:59:54Z"));
    e.handle(EngineEvent::Tick);
    assert_eq!(e.state(), AccessState::Active);

    clock.set(utc("2024-01-01T00:59:55Z"));
    e.handle(EngineEvent::Tick);
    assert_eq!(e.state(), AccessState::Suspended);
    assert_eq!(e.navigator().history(), ["/subscription-expired".to_string()]);
    assert!(e.machine().store().load_suspended());
}

#[test]
fn test_inactive_poll_suspends_without_timer() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T00:00:00Z", "2024-01-01T00:00:00", 86_400));
    e.start(None);
    assert!(e.timer().is_armed());

    clock.advance(Duration::seconds(5));
    e.transport()
        .respond_json(STATUS, 200, inactive("2024-01-01T00:00:05Z"));
    e.handle(EngineEvent::Focus);

    assert_eq!(e.state(), AccessState::Suspended);
    assert!(!e.timer().is_armed(), "suspension disarms the timer");
}

#[test]
fn test_suspended_requests_never_reach_network() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport()
        .respond_json(STATUS, 200, inactive("2024-01-01T00:00:00Z"));
    e.start(None);
    assert_eq!(e.state(), AccessState::Suspended);

    let calls_before = e.transport().call_count();
    let resp = e
        .request(&HttpRequest::get("http://localhost:8000/api/beneficiaries/?page=1"))
        .unwrap();

    assert_eq!(resp.status, 204);
    assert!(resp.synthesized);
    assert_eq!(e.transport().call_count(), calls_before);
    assert_eq!(e.transport().calls_to("/api/beneficiaries/"), 0);
    assert_eq!(e.interceptor().short_circuited(), 1);
}

#[test]
fn test_allowlisted_requests_pass_while_suspended() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport()
        .respond_json(STATUS, 200, inactive("2024-01-01T00:00:00Z"));
    e.transport()
        .respond_json("/api/plans/", 200, json!([{"id": 1}]));
    e.start(None);

    let resp = e.request(&HttpRequest::get("/api/plans/")).unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(e.transport().calls_to("/api/plans/"), 1);
}

#[test]
fn test_exempt_role_not_locked_out() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("superadmin", &clock);
    e.transport()
        .respond_json(STATUS, 200, inactive("2024-01-01T00:00:00Z"));
    e.start(None);

    assert_eq!(e.state(), AccessState::Active);
    assert!(e.navigator().history().is_empty());
    assert!(!e.machine().store().load_suspended());
}

#[test]
fn test_denial_response_suspends_immediately() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T00:00:00Z", "2024-01-01T00:00:00", 86_400));
    e.transport().respond_json(
        "/api/documents/",
        403,
        json!({"detail": "Your subscription has expired."}),
    );
    e.start(None);
    assert_eq!(e.state(), AccessState::Active);

    let resp = e.request(&HttpRequest::get("/api/documents/")).unwrap();
    assert_eq!(resp.status, 403);
    assert_eq!(e.state(), AccessState::Suspended);
    assert_eq!(e.navigator().current_surface(), "/subscription-expired");

    // Follow-up requests are now short-circuited.
    e.request(&HttpRequest::get("/api/documents/")).unwrap();
    assert_eq!(e.transport().calls_to("/api/documents/"), 1);
}

#[test]
fn test_owner_expiry_notifies_server_once() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("owner", &clock);
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T00:00:00Z", "2024-01-01T00:00:00", 10));
    e.transport().respond_json(EXPIRE_NOW, 200, json!({"ok": true}));
    e.start(None);

    clock.advance(Duration::seconds(10));
    e.handle(EngineEvent::Tick);
    assert_eq!(e.state(), AccessState::Suspended);
    assert_eq!(e.navigator().current_surface(), "/billing/renew");
    assert_eq!(e.transport().calls_to(EXPIRE_NOW), 1);

    // Server has not swept yet and still reports active with the same window.
    clock.advance(Duration::seconds(5));
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T00:00:15Z", "2024-01-01T00:00:00", 10));
    e.handle(EngineEvent::VisibilityRegained);
    assert_eq!(e.state(), AccessState::Suspended, "no optimistic reactivation");
    assert_eq!(e.transport().calls_to(EXPIRE_NOW), 1);
    assert_eq!(e.navigator().history().len(), 1);
}

#[test]
fn test_stale_response_does_not_override_newer() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T00:00:00Z", "2024-01-01T00:00:00", 86_400));
    e.start(None);

    let older_ticket = e.begin_poll(PollTrigger::Interval);
    let newer_ticket = e.begin_poll(PollTrigger::Focus);

    let newer: StatusResponse = serde_json::from_value(active(
        "2024-01-01T00:00:20Z",
        "2024-01-01T00:00:00",
        86_400,
    ))
    .unwrap();
    let stale: StatusResponse = serde_json::from_value(inactive("2024-01-01T00:00:10Z")).unwrap();

    assert!(matches!(
        e.complete_poll(newer_ticket, &newer),
        PollOutcome::Applied(PollVerdict::Active { .. })
    ));
    assert_eq!(e.complete_poll(older_ticket, &stale), PollOutcome::Stale);
    assert_eq!(e.state(), AccessState::Active);
}

#[test]
fn test_inactive_after_server_clock_step_back_suspends() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T01:00:00Z", "2024-01-01T00:00:00", 86_400));
    e.start(None);
    assert_eq!(e.offset(), Duration::hours(1));

    clock.advance(Duration::seconds(30));
    e.transport()
        .respond_json(STATUS, 200, inactive("2024-01-01T00:00:30Z"));
    assert_eq!(
        e.check_status(PollTrigger::Interval),
        PollOutcome::Applied(PollVerdict::Inactive)
    );
    assert_eq!(e.state(), AccessState::Suspended);
    assert_eq!(e.offset(), Duration::zero());
}

#[test]
fn test_network_failure_keeps_state_and_timer() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T00:00:00Z", "2024-01-01T00:00:00", 3600));
    e.start(None);

    e.transport().fail(STATUS, "connection refused");
    assert_eq!(e.check_status(PollTrigger::Manual), PollOutcome::Failed);
    assert_eq!(e.state(), AccessState::Active);
    assert!(e.timer().is_armed());
}

#[test]
fn test_malformed_status_payload_is_swallowed() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport().respond(
        STATUS,
        accessgate_core::HttpResponse::new(200, "<html>gateway</html>"),
    );
    e.start(None);
    assert_eq!(e.state(), AccessState::Unknown);
    assert!(e.navigator().history().is_empty());
}

#[test]
fn test_indeterminate_expiry_relies_on_polling() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport().respond_json(
        STATUS,
        200,
        json!({
            "has_active_subscription": true,
            "checked_at": "2024-01-01T00:00:00Z",
            "current_subscription": {"plan": {"name": "Monthly"}}
        }),
    );
    e.start(None);

    assert_eq!(e.state(), AccessState::Active);
    assert!(e.expiry().is_none());
    assert!(!e.timer().is_armed());
    assert_eq!(e.next_wakeup(), Some(utc("2024-01-01T00:00:30Z")));
}

#[test]
fn test_interval_poll_on_tick() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T00:00:00Z", "2024-01-01T00:00:00", 86_400));
    e.start(None);
    assert_eq!(e.transport().calls_to(STATUS), 1);

    clock.advance(Duration::seconds(29));
    e.handle(EngineEvent::Tick);
    assert_eq!(e.transport().calls_to(STATUS), 1);

    clock.advance(Duration::seconds(1));
    e.handle(EngineEvent::Tick);
    assert_eq!(e.transport().calls_to(STATUS), 2);
}

#[test]
fn test_route_change_and_focus_trigger_polls() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T00:00:00Z", "2024-01-01T00:00:00", 86_400));
    e.start(None);

    e.handle(EngineEvent::RouteChanged("/documents".to_string()));
    e.handle(EngineEvent::Focus);
    e.handle(EngineEvent::VisibilityRegained);
    assert_eq!(e.transport().calls_to(STATUS), 4);
}

#[test]
fn test_restored_access_clears_flag_and_returns_home() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine_with("staff", &clock, true);
    assert_eq!(e.state(), AccessState::Suspended);
    e.navigator_mut().visit("/subscription-expired");

    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T00:00:00Z", "2024-01-01T00:00:00", 86_400));
    e.start(None);

    assert_eq!(e.state(), AccessState::Active);
    assert_eq!(e.navigator().current_surface(), "/dashboard");
    assert!(!e.machine().store().load_suspended());
}

#[test]
fn test_checkout_verified_before_first_status() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("owner", &clock);
    e.transport().respond_json(CHECKOUT_VERIFY, 200, json!({"verified": true}));
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T00:00:00Z", "2024-01-01T00:00:00", 86_400));
    e.start(Some("cs_test_123"));

    let calls = e.transport().calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].url.ends_with(CHECKOUT_VERIFY));
    assert_eq!(calls[0].body, Some(json!({"session_id": "cs_test_123"})));
    assert!(calls[1].url.ends_with(STATUS));
}

#[test]
fn test_teardown_releases_everything() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T00:00:00Z", "2024-01-01T00:00:00", 60));
    let rx = e.subscribe();

    for _ in 0..3 {
        e.start(None);
        assert!(e.interceptor().is_installed());
        e.stop();
        assert!(!e.interceptor().is_installed());
        assert!(!e.timer().is_armed());
        assert_eq!(e.next_wakeup(), None);
    }
    assert_eq!(e.interceptor().installs(), 3);
    assert_eq!(e.machine().observer_count(), 0);
    drop(rx);

    // A stopped engine ignores events; no leaked timer fires.
    clock.advance(Duration::minutes(5));
    e.handle(EngineEvent::Tick);
    assert_eq!(e.state(), AccessState::Active);
}

#[test]
fn test_past_expiry_with_active_server_suspends() {
    let clock = ManualClock::new(utc("2024-01-01T02:00:00Z"));
    let mut e = engine("staff", &clock);
    e.transport()
        .respond_json(STATUS, 200, active("2024-01-01T02:00:00Z", "2024-01-01T00:00:00", 3600));
    e.start(None);
    assert_eq!(e.state(), AccessState::Suspended);
    assert!(!e.timer().is_armed());
    assert!(clock.now() > e.expiry().unwrap().instant);
}
