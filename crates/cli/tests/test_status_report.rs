//! Tests for the read-only status report

use accessgate_cli::commands::status::StatusReport;
use accessgate_core::{AccessState, ManualClock, StatusResponse};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn status(value: serde_json::Value) -> StatusResponse {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_active_report_uses_server_time() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let report = StatusReport::from_status(
        &status(json!({
            "has_active_subscription": true,
            "checked_at": "2024-01-01T00:00:05Z",
            "current_subscription": {
                "created_at": "2024-01-01T00:00:00",
                "plan": {"duration_in_seconds": 3600}
            }
        })),
        &clock,
    );

    assert_eq!(report.state, AccessState::Active);
    assert_eq!(report.offset, Duration::seconds(5));
    assert_eq!(report.server_now, utc("2024-01-01T00:00:05Z"));
    assert_eq!(report.expiry.unwrap().instant, utc("2024-01-01T01:00:00Z"));
}

#[test]
fn test_inactive_report() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let report = StatusReport::from_status(
        &status(json!({"has_active_subscription": false, "current_subscription": null})),
        &clock,
    );
    assert_eq!(report.state, AccessState::Suspended);
    assert!(report.expiry.is_none());
    assert_eq!(report.offset, Duration::zero());
}

#[test]
fn test_elapsed_expiry_reports_suspended() {
    let clock = ManualClock::new(utc("2024-01-01T02:00:00Z"));
    let report = StatusReport::from_status(
        &status(json!({
            "has_active_subscription": true,
            "checked_at": "2024-01-01T02:00:00Z",
            "current_subscription": {
                "created_at": "2024-01-01T00:00:00",
                "plan": {"duration_in_seconds": 3600}
            }
        })),
        &clock,
    );
    assert_eq!(report.state, AccessState::Suspended);
}

#[test]
fn test_indeterminate_expiry_stays_active() {
    let clock = ManualClock::new(utc("2024-01-01T00:00:00Z"));
    let report = StatusReport::from_status(
        &status(json!({"has_active_subscription": true})),
        &clock,
    );
    assert_eq!(report.state, AccessState::Active);
    assert!(report.expiry.is_none());
}
