//! Wire types for the subscription status endpoint
//!
//! All of these are read-only snapshots owned by the backend. Unknown fields
//! are ignored so schema additions on the server never break the gate.

use crate::timestamp::RawTimestamp;
use serde::{Deserialize, Serialize};

/// A billing plan, as embedded in a subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Structured duration, authoritative when present and positive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_seconds: Option<i64>,

    #[serde(default)]
    pub is_trial: bool,

    /// Trial length, only consulted when `is_trial` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_seconds: Option<i64>,

    /// Human-readable duration ("30 seconds", "1 month")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Plan {
    /// Free-text fields in the order they are searched for a duration.
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        [&self.duration, &self.name, &self.description]
            .into_iter()
            .filter_map(|f| f.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<RawTimestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<RawTimestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<RawTimestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<RawTimestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<RawTimestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_datetime: Option<RawTimestamp>,

    /// Date-only end, resolved to the end of that day
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<RawTimestamp>,
}

impl Subscription {
    /// Start-of-window candidates, most specific first.
    pub fn start_fields(&self) -> impl Iterator<Item = &RawTimestamp> {
        [&self.created_at, &self.start_date]
            .into_iter()
            .filter_map(|f| f.as_ref())
    }

    /// Explicit end date-time candidates in lookup order.
    pub fn end_datetime_fields(&self) -> impl Iterator<Item = &RawTimestamp> {
        [&self.ends_at, &self.end_at, &self.expires_at, &self.end_datetime]
            .into_iter()
            .filter_map(|f| f.as_ref())
    }
}

/// Payload of `GET status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub has_active_subscription: bool,

    #[serde(default)]
    pub current_subscription: Option<Subscription>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<RawTimestamp>,
}
