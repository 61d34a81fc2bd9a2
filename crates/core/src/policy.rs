//! Role redirect policy — what each role sees once access is lost
//!
//! The mapping is plain data loaded from configuration; adding a role never
//! touches the state machine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendBehavior {
    /// Billing owner: sent to the renewal flow, server told to expire now
    RenewAndNotify,
    /// Never suspended; kept on the home surface
    Exempt,
    /// Sent to the lockout surface
    #[default]
    Lockout,
}

impl SuspendBehavior {
    pub fn notifies_server(self) -> bool {
        self == SuspendBehavior::RenewAndNotify
    }
}

impl fmt::Display for SuspendBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuspendBehavior::RenewAndNotify => write!(f, "renew_and_notify"),
            SuspendBehavior::Exempt => write!(f, "exempt"),
            SuspendBehavior::Lockout => write!(f, "lockout"),
        }
    }
}

/// Navigation targets used by the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surfaces {
    #[serde(default = "default_lockout")]
    pub lockout: String,

    #[serde(default = "default_renewal")]
    pub renewal: String,

    /// Home for roles without an entry in `home`
    #[serde(default = "default_home")]
    pub default_home: String,

    /// Per-role home surfaces
    #[serde(default)]
    pub home: HashMap<String, String>,
}

fn default_lockout() -> String {
    "/subscription-expired".to_string()
}

fn default_renewal() -> String {
    "/billing/renew".to_string()
}

fn default_home() -> String {
    "/dashboard".to_string()
}

impl Default for Surfaces {
    fn default() -> Self {
        Self {
            lockout: default_lockout(),
            renewal: default_renewal(),
            default_home: default_home(),
            home: HashMap::new(),
        }
    }
}

impl Surfaces {
    pub fn home_for(&self, role: &str) -> &str {
        self.home
            .get(&role.to_lowercase())
            .map(String::as_str)
            .unwrap_or(&self.default_home)
    }

    /// Whether `surface` is one the gate sends suspended users to.
    pub fn is_gated(&self, surface: &str) -> bool {
        same_surface(surface, &self.lockout) || same_surface(surface, &self.renewal)
    }
}

/// Surface equality, ignoring query strings and trailing slashes.
pub fn same_surface(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

fn normalize(surface: &str) -> &str {
    let path = surface.split(['?', '#']).next().unwrap_or(surface);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRedirectPolicy {
    behaviors: HashMap<String, SuspendBehavior>,
    default_behavior: SuspendBehavior,
    surfaces: Surfaces,
}

impl Default for RoleRedirectPolicy {
    fn default() -> Self {
        let behaviors = [
            ("owner".to_string(), SuspendBehavior::RenewAndNotify),
            ("superadmin".to_string(), SuspendBehavior::Exempt),
        ]
        .into_iter()
        .collect();
        Self::new(behaviors, SuspendBehavior::Lockout, Surfaces::default())
    }
}

impl RoleRedirectPolicy {
    /// Role names are matched case-insensitively.
    pub fn new(
        behaviors: HashMap<String, SuspendBehavior>,
        default_behavior: SuspendBehavior,
        mut surfaces: Surfaces,
    ) -> Self {
        surfaces.home = surfaces
            .home
            .into_iter()
            .map(|(role, home)| (role.to_lowercase(), home))
            .collect();
        Self {
            behaviors: behaviors
                .into_iter()
                .map(|(role, b)| (role.to_lowercase(), b))
                .collect(),
            default_behavior,
            surfaces,
        }
    }

    pub fn behavior_for(&self, role: &str) -> SuspendBehavior {
        self.behaviors
            .get(&role.to_lowercase())
            .copied()
            .unwrap_or(self.default_behavior)
    }

    /// Where a suspended user with this behavior is sent. Exempt roles go nowhere.
    pub fn suspend_target(&self, behavior: SuspendBehavior) -> Option<&str> {
        match behavior {
            SuspendBehavior::RenewAndNotify => Some(&self.surfaces.renewal),
            SuspendBehavior::Lockout => Some(&self.surfaces.lockout),
            SuspendBehavior::Exempt => None,
        }
    }

    pub fn home_for(&self, role: &str) -> &str {
        self.surfaces.home_for(role)
    }

    pub fn surfaces(&self) -> &Surfaces {
        &self.surfaces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_query_and_trailing_slash() {
        assert_eq!(normalize("/billing/renew/"), "/billing/renew");
        assert_eq!(normalize("/billing/renew?plan=3"), "/billing/renew");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn role_lookup_is_case_insensitive() {
        let policy = RoleRedirectPolicy::default();
        assert_eq!(policy.behavior_for("Owner"), SuspendBehavior::RenewAndNotify);
        assert_eq!(policy.behavior_for("SUPERADMIN"), SuspendBehavior::Exempt);
        assert_eq!(policy.behavior_for("staff"), SuspendBehavior::Lockout);
    }
}
