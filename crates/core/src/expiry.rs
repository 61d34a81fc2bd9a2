//! Expiry derivation — subscription + plan snapshot to an absolute instant
//!
//! Strategies, in priority order:
//! 1. structured seconds on the plan (or trial seconds for a trial plan), from the window start
//! 2. a `<N> second(s)` phrase in the plan's free text, from the window start
//! 3. an explicit end date-time on the subscription
//! 4. a date-only end on the subscription, at the end of that day
//!
//! A strategy whose inputs do not parse is skipped, never fatal. When nothing
//! applies the expiry is indeterminate and callers rely on polling alone.

use crate::model::{Plan, Subscription};
use crate::timestamp::RawTimestamp;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Which strategy produced an expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirySource {
    PlanSeconds,
    TrialSeconds,
    PlanText,
    EndDateTime,
    EndDate,
}

impl fmt::Display for ExpirySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpirySource::PlanSeconds => write!(f, "plan seconds"),
            ExpirySource::TrialSeconds => write!(f, "trial seconds"),
            ExpirySource::PlanText => write!(f, "plan text"),
            ExpirySource::EndDateTime => write!(f, "end date-time"),
            ExpirySource::EndDate => write!(f, "end date"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Expiry {
    pub instant: DateTime<Utc>,
    pub source: ExpirySource,
}

fn seconds_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\b(\d+)\s*seconds?\b").unwrap())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExpiryComputer;

impl ExpiryComputer {
    pub fn new() -> Self {
        Self
    }

    /// Computes the expiry for a subscription.
    ///
    /// `plan` overrides the subscription's inline plan when given.
    pub fn compute(&self, subscription: &Subscription, plan: Option<&Plan>) -> Option<Expiry> {
        let plan = plan.or(subscription.plan.as_ref());

        let applicable = applicable_sources(subscription, plan);
        if applicable.len() > 1 {
            warn!(
                sources = ?applicable,
                "subscription matches several expiry encodings; using the first by priority"
            );
        }

        let start = window_start(subscription);

        if let (Some(plan), Some(start)) = (plan, start) {
            if let Some((seconds, source)) = structured_seconds(plan) {
                if let Some(instant) = add_seconds(start, seconds) {
                    return Some(Expiry { instant, source });
                }
            }
            if let Some(seconds) = text_seconds(plan) {
                if let Some(instant) = add_seconds(start, seconds) {
                    return Some(Expiry {
                        instant,
                        source: ExpirySource::PlanText,
                    });
                }
            }
        }

        if let Some(instant) = subscription.end_datetime_fields().find_map(RawTimestamp::to_utc) {
            return Some(Expiry {
                instant,
                source: ExpirySource::EndDateTime,
            });
        }

        if let Some(instant) = subscription.end_date.as_ref().and_then(RawTimestamp::to_utc) {
            return Some(Expiry {
                instant,
                source: ExpirySource::EndDate,
            });
        }

        debug!("no expiry encoding matched; relying on polling");
        None
    }
}

fn window_start(subscription: &Subscription) -> Option<DateTime<Utc>> {
    subscription.start_fields().find_map(RawTimestamp::to_utc)
}

fn structured_seconds(plan: &Plan) -> Option<(i64, ExpirySource)> {
    if let Some(secs) = plan.duration_in_seconds.filter(|s| *s > 0) {
        return Some((secs, ExpirySource::PlanSeconds));
    }
    if plan.is_trial {
        if let Some(secs) = plan.trial_seconds.filter(|s| *s > 0) {
            return Some((secs, ExpirySource::TrialSeconds));
        }
    }
    None
}

fn text_seconds(plan: &Plan) -> Option<i64> {
    plan.text_fields().find_map(|text| {
        seconds_pattern()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .filter(|s| *s > 0)
    })
}

fn add_seconds(start: DateTime<Utc>, seconds: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(seconds).and_then(|d| start.checked_add_signed(d))
}

/// Strategies whose raw inputs are present, regardless of whether they parse.
fn applicable_sources(subscription: &Subscription, plan: Option<&Plan>) -> Vec<ExpirySource> {
    let mut sources = Vec::new();
    if let Some(plan) = plan {
        if let Some((_, source)) = structured_seconds(plan) {
            sources.push(source);
        }
        if text_seconds(plan).is_some() {
            sources.push(ExpirySource::PlanText);
        }
    }
    if subscription.end_datetime_fields().next().is_some() {
        sources.push(ExpirySource::EndDateTime);
    }
    if subscription.end_date.is_some() {
        sources.push(ExpirySource::EndDate);
    }
    sources
}
