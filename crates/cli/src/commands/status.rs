//! Status command — poll once and report
//!
//! Read-only: the suspended flag, navigation and expire-now are left to `run`.

use accessgate_core::{
    api, AccessState, Clock, ClockSynchronizer, Expiry, ExpiryComputer, FlagStore, GateError,
    StatusResponse, SystemClock, Transport,
};
use anyhow::Result;
use chrono::{DateTime, Duration, Local, Utc};
use colored::Colorize;
use std::path::Path;

use super::{load_config, print_state, require_credentials};
use crate::store::{self, FileFlagStore};
use crate::transport::HttpTransport;

/// What one status response means for the signed-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub state: AccessState,
    pub expiry: Option<Expiry>,
    pub offset: Duration,
    pub server_now: DateTime<Utc>,
}

impl StatusReport {
    /// Derives the report without touching any session state.
    pub fn from_status(status: &StatusResponse, clock: &dyn Clock) -> Self {
        let mut sync = ClockSynchronizer::new();
        if let Some(ts) = &status.checked_at {
            sync.update(ts, clock);
        }
        let server_now = sync.now(clock);

        let expiry = if status.has_active_subscription {
            status
                .current_subscription
                .as_ref()
                .and_then(|sub| ExpiryComputer::new().compute(sub, None))
        } else {
            None
        };
        let state = match (status.has_active_subscription, expiry) {
            (false, _) => AccessState::Suspended,
            (true, Some(e)) if e.instant <= server_now => AccessState::Suspended,
            (true, _) => AccessState::Active,
        };

        Self {
            state,
            expiry,
            offset: sync.offset(),
            server_now,
        }
    }
}

pub fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let dir = store::require_state_dir()?;
    let creds = require_credentials(&dir)?;

    let transport = HttpTransport::new(config.api.timeout_secs, Some(creds.token.clone()))?;
    let request = api::status_request(&config.api);
    let status = transport
        .send(&request)
        .map_err(GateError::from)
        .and_then(|resp| api::parse_status(&request, &resp))?;
    let report = StatusReport::from_status(&status, &SystemClock);

    print_state(report.state);
    eprintln!(
        "  {}: {} ({})",
        "Role".bold(),
        creds.role.cyan(),
        config.policy().behavior_for(&creds.role)
    );

    match report.expiry {
        Some(expiry) => {
            eprintln!(
                "  {}: {} ({}, {})",
                "Expires".bold(),
                expiry.instant.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                expiry.source,
                format_remaining(expiry.instant - report.server_now)
            );
        }
        None if report.state == AccessState::Active => {
            eprintln!("  {}: {}", "Expires".bold(), "unknown".dimmed());
        }
        None => {}
    }

    eprintln!(
        "  {}: {:+} ms",
        "Clock offset".bold(),
        report.offset.num_milliseconds()
    );
    if FileFlagStore::new(&dir).load_suspended() {
        eprintln!("  {}: {}", "Flag".bold(), "suspended (last session)".red());
    }
    eprintln!();

    Ok(())
}

fn format_remaining(d: Duration) -> String {
    if d <= Duration::zero() {
        return "elapsed".to_string();
    }
    let secs = d.num_seconds();
    let (days, hours, mins) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60);
    if days > 0 {
        format!("{}d {}h left", days, hours)
    } else if hours > 0 {
        format!("{}h {}m left", hours, mins)
    } else {
        format!("{}m {}s left", mins, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::seconds(-5)), "elapsed");
        assert_eq!(format_remaining(Duration::seconds(75)), "1m 15s left");
        assert_eq!(format_remaining(Duration::minutes(125)), "2h 5m left");
        assert_eq!(format_remaining(Duration::hours(50)), "2d 2h left");
    }
}
