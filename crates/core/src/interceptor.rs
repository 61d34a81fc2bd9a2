//! Request interception
//!
//! Inbound: authorization-denied responses whose body names an expired or
//! inactive subscription are turned into an immediate suspension signal.
//!
//! Outbound: until access is confirmed active, every request whose path is not
//! on the allowlist is answered locally with an empty `204` and never reaches
//! the network.

use crate::state::AccessState;
use crate::transport::{HttpRequest, HttpResponse};
use tracing::debug;
use url::Url;

/// Statuses that can carry an access denial.
const DENIAL_STATUSES: &[u16] = &[401, 402, 403];

/// Base used to resolve relative request URLs.
const RELATIVE_BASE: &str = "http://relative.invalid/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Forward,
    ShortCircuit(HttpResponse),
}

#[derive(Debug)]
pub struct RequestInterceptor {
    allowlist: Vec<String>,
    denial_messages: Vec<String>,
    installed: bool,
    installs: u64,
    short_circuited: u64,
}

impl RequestInterceptor {
    pub fn new(allowlist: &[String], denial_messages: &[String]) -> Self {
        Self {
            allowlist: allowlist.iter().map(|p| normalize_path(p)).collect(),
            denial_messages: denial_messages
                .iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            installed: false,
            installs: 0,
            short_circuited: 0,
        }
    }

    /// Installs the interceptor. Returns `false` if it was already installed.
    pub fn start(&mut self) -> bool {
        if self.installed {
            return false;
        }
        self.installed = true;
        self.installs += 1;
        debug!("request interceptor installed");
        true
    }

    /// Releases the interceptor. Returns `false` if it was not installed.
    pub fn stop(&mut self) -> bool {
        if !self.installed {
            return false;
        }
        self.installed = false;
        debug!("request interceptor released");
        true
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Number of times the interceptor has been installed over its lifetime.
    pub fn installs(&self) -> u64 {
        self.installs
    }

    /// Number of requests answered locally.
    pub fn short_circuited(&self) -> u64 {
        self.short_circuited
    }

    /// Decides whether an outbound request may reach the network.
    pub fn outbound(&mut self, request: &HttpRequest, state: AccessState) -> Outbound {
        if !self.installed || state == AccessState::Active || self.is_allowlisted(&request.url) {
            return Outbound::Forward;
        }
        self.short_circuited += 1;
        debug!(
            method = %request.method,
            path = %request_path(&request.url),
            %state,
            "request suppressed"
        );
        Outbound::ShortCircuit(HttpResponse::suppressed())
    }

    /// Whether a response signals that access was revoked out of band.
    pub fn is_denial(&self, response: &HttpResponse) -> bool {
        if !self.installed || !DENIAL_STATUSES.contains(&response.status) {
            return false;
        }
        let body = response.body.to_lowercase();
        self.denial_messages.iter().any(|m| body.contains(m.as_str()))
    }

    pub fn is_allowlisted(&self, url: &str) -> bool {
        let path = request_path(url);
        self.allowlist.iter().any(|entry| path_matches(&path, entry))
    }
}

/// Path component of a request URL: origin, query and fragment stripped,
/// trailing slash removed.
pub fn request_path(url: &str) -> String {
    let parsed = Url::parse(url).or_else(|_| Url::parse(RELATIVE_BASE).and_then(|b| b.join(url)));
    match parsed {
        Ok(u) => normalize_path(u.path()),
        Err(_) => {
            let raw = url.split(['?', '#']).next().unwrap_or(url);
            normalize_path(raw)
        }
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Exact match, or `entry` is a whole-segment prefix of `path`.
fn path_matches(path: &str, entry: &str) -> bool {
    if entry == "/" {
        return path == "/";
    }
    match path.strip_prefix(entry) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_matching_respects_segments() {
        assert!(path_matches("/api/plans", "/api/plans"));
        assert!(path_matches("/api/plans/3", "/api/plans"));
        assert!(!path_matches("/api/plansx", "/api/plans"));
        assert!(!path_matches("/api", "/api/plans"));
        assert!(!path_matches("/anything", "/"));
    }

    #[test]
    fn normalize_adds_leading_slash() {
        assert_eq!(normalize_path("api/plans/"), "/api/plans");
        assert_eq!(normalize_path(""), "/");
    }
}
