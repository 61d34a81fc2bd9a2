//! Configuration file parsing for .accessgate.toml

use crate::policy::{RoleRedirectPolicy, SuspendBehavior, Surfaces};
use crate::timer::{DEFAULT_REEVALUATE_SECS, MAX_TIMER_DELAY_MS};
use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const CONFIG_FILENAME: &str = ".accessgate.toml";

/// Upper bound for `poll_interval_secs` and `reevaluate_secs` (one day).
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Upper bound for `guard_window_ms`.
pub const MAX_GUARD_WINDOW_MS: u64 = 60_000;

/// Overrides `[api] base_url` when set.
pub const API_URL_ENV: &str = "ACCESSGATE_API_URL";

/// Main configuration structure for .accessgate.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub interceptor: InterceptorConfig,

    #[serde(default)]
    pub surfaces: Surfaces,

    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_status_path")]
    pub status_path: String,

    #[serde(default = "default_expire_now_path")]
    pub expire_now_path: String,

    #[serde(default = "default_checkout_verify_path")]
    pub checkout_verify_path: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Status poll cadence for an authenticated session
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Re-evaluation cadence while the expiry is beyond the timer cap
    #[serde(default = "default_reevaluate_secs")]
    pub reevaluate_secs: u64,

    /// Largest delay a single timer may be armed with
    #[serde(default = "default_max_timer_delay_ms")]
    pub max_timer_delay_ms: u64,

    /// How long the re-entrancy guard holds after a transition
    #[serde(default = "default_guard_window_ms")]
    pub guard_window_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterceptorConfig {
    /// Paths allowed to reach the network while access is not active
    #[serde(default = "default_allowlist")]
    pub allowlist: Vec<String>,

    /// Case-insensitive substrings that mark a denial as expiry-related
    #[serde(default = "default_denial_messages")]
    pub denial_messages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesConfig {
    /// Behavior for roles not listed
    #[serde(default)]
    pub default_behavior: SuspendBehavior,

    /// role = "renew_and_notify" | "exempt" | "lockout"
    #[serde(flatten)]
    pub behaviors: HashMap<String, SuspendBehavior>,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_status_path() -> String {
    "/api/subscriptions/status/".to_string()
}

fn default_expire_now_path() -> String {
    "/api/subscriptions/expire-now/".to_string()
}

fn default_checkout_verify_path() -> String {
    "/api/payments/checkout/verify/".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_reevaluate_secs() -> u64 {
    DEFAULT_REEVALUATE_SECS as u64
}

fn default_max_timer_delay_ms() -> u64 {
    MAX_TIMER_DELAY_MS as u64
}

fn default_guard_window_ms() -> u64 {
    1000
}

fn default_allowlist() -> Vec<String> {
    vec![
        "/api/subscriptions/status".to_string(),
        "/api/subscriptions/expire-now".to_string(),
        "/api/subscriptions/renew".to_string(),
        "/api/auth/me".to_string(),
        "/api/auth/login".to_string(),
        "/api/auth/logout".to_string(),
        "/api/auth/token/refresh".to_string(),
        "/api/plans".to_string(),
        "/api/public".to_string(),
        "/api/payments/checkout".to_string(),
    ]
}

fn default_denial_messages() -> Vec<String> {
    vec![
        "subscription expired".to_string(),
        "subscription has expired".to_string(),
        "no active subscription".to_string(),
        "subscription is inactive".to_string(),
        "subscription inactive".to_string(),
        "access suspended".to_string(),
    ]
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            status_path: default_status_path(),
            expire_now_path: default_expire_now_path(),
            checkout_verify_path: default_checkout_verify_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            reevaluate_secs: default_reevaluate_secs(),
            max_timer_delay_ms: default_max_timer_delay_ms(),
            guard_window_ms: default_guard_window_ms(),
        }
    }
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            allowlist: default_allowlist(),
            denial_messages: default_denial_messages(),
        }
    }
}

impl Default for RolesConfig {
    fn default() -> Self {
        let behaviors = [
            ("owner".to_string(), SuspendBehavior::RenewAndNotify),
            ("superadmin".to_string(), SuspendBehavior::Exempt),
        ]
        .into_iter()
        .collect();
        Self {
            default_behavior: SuspendBehavior::Lockout,
            behaviors,
        }
    }
}

impl ApiConfig {
    /// Joins a path onto the base URL.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::seconds(self.poll_interval_secs.clamp(1, MAX_INTERVAL_SECS) as i64)
    }

    pub fn reevaluate_every(&self) -> Duration {
        Duration::seconds(self.reevaluate_secs.clamp(1, MAX_INTERVAL_SECS) as i64)
    }

    pub fn max_timer_delay(&self) -> Duration {
        let ms = self.max_timer_delay_ms.min(MAX_TIMER_DELAY_MS as u64);
        Duration::milliseconds(ms as i64)
    }

    pub fn guard_window(&self) -> Duration {
        Duration::milliseconds(self.guard_window_ms.min(MAX_GUARD_WINDOW_MS) as i64)
    }
}

impl GateConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: GateConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Find and load .accessgate.toml from the current directory or ancestors
    pub fn find_and_load(start_dir: &Path) -> Result<Self> {
        let mut current = start_dir;

        loop {
            let config_path = current.join(CONFIG_FILENAME);
            if config_path.exists() {
                return Self::from_file(&config_path);
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        // No config found, use defaults
        Ok(Self::default())
    }

    /// Applies environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api.base_url = url.trim().to_string();
            }
        }
        self
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Builds the role redirect policy from `[roles]` and `[surfaces]`.
    pub fn policy(&self) -> RoleRedirectPolicy {
        RoleRedirectPolicy::new(
            self.roles.behaviors.clone(),
            self.roles.default_behavior,
            self.surfaces.clone(),
        )
    }
}
