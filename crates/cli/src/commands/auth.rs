//! Auth command — manage stored credentials

use accessgate_core::{api, FlagStore, GateConfig, Transport};
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use super::load_config;
use crate::store::{self, Credentials, FileFlagStore};
use crate::transport::HttpTransport;

const DEFAULT_USER: &str = "me";

/// Runs `accessgate auth` with the given action.
///
/// - No args: open the app's sign-in page
/// - `--token <T> --role <R>`: save credentials and check them
/// - `status`: show stored credentials
/// - `logout`: remove credentials and the suspended flag
pub fn run(
    action: Option<&AuthAction>,
    token: Option<&str>,
    role: Option<&str>,
    user: Option<&str>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;

    if let Some(t) = token {
        let role = role.ok_or_else(|| anyhow::anyhow!("--role is required with --token"))?;
        return run_set_token(&config, t, role, user.unwrap_or(DEFAULT_USER));
    }

    match action {
        Some(AuthAction::Status) => run_status(&config),
        Some(AuthAction::Logout) => run_logout(),
        None => run_browser(&config),
    }
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum AuthAction {
    /// Show stored credentials
    Status,
    /// Remove stored credentials
    Logout,
}

fn run_browser(config: &GateConfig) -> Result<()> {
    let url = config.api.url_for("/login");
    eprintln!("{}", "  Opening browser to sign in...".bold());
    eprintln!();

    if let Err(e) = open::that(&url) {
        eprintln!("  {} Could not open browser: {}", "Error:".red().bold(), e);
        eprintln!();
        eprintln!("  Visit {} to sign in, then run:", url.bold());
    } else {
        eprintln!("  After signing in, copy your API token and run:");
    }
    eprintln!(
        "    {}",
        "accessgate auth --token <TOKEN> --role <ROLE>".bold()
    );
    eprintln!();

    Ok(())
}

fn run_set_token(config: &GateConfig, token: &str, role: &str, user: &str) -> Result<()> {
    let dir = store::require_state_dir()?;
    let creds = Credentials::new(token, user, role);

    eprint!("  Saving credentials... ");
    creds.save(&dir)?;
    eprintln!("{}", "done".green());

    eprint!("  Checking subscription... ");
    let transport = HttpTransport::new(config.api.timeout_secs, Some(creds.token.clone()))?;
    let request = api::status_request(&config.api);
    let checked = transport
        .send(&request)
        .map_err(accessgate_core::GateError::from)
        .and_then(|resp| api::parse_status(&request, &resp));

    match checked {
        Ok(status) if status.has_active_subscription => eprintln!("{}", "active".green()),
        Ok(_) => eprintln!("{}", "inactive".red()),
        Err(e) => {
            eprintln!("{}", "unavailable".yellow());
            eprintln!(
                "  Credentials saved. Status will be checked on next run. ({})",
                e.to_string().dimmed()
            );
        }
    }
    eprintln!();
    print_credentials(config, &creds, &dir);

    Ok(())
}

fn run_status(config: &GateConfig) -> Result<()> {
    let dir = store::require_state_dir()?;
    match Credentials::load(&dir) {
        Some(creds) => print_credentials(config, &creds, &dir),
        None => {
            eprintln!("  {}", "Not signed in.".yellow());
            eprintln!(
                "  Run {}",
                "accessgate auth --token <TOKEN> --role <ROLE>".bold()
            );
        }
    }
    Ok(())
}

fn run_logout() -> Result<()> {
    let dir = store::require_state_dir()?;
    Credentials::remove(&dir)?;
    FileFlagStore::new(&dir).store_suspended(false)?;
    eprintln!("  {} Credentials removed.", "\u{2713}".green());
    Ok(())
}

fn print_credentials(config: &GateConfig, creds: &Credentials, dir: &Path) {
    let policy = config.policy();
    eprintln!("  {}: {}", "User".bold(), creds.user_id);
    eprintln!(
        "  {}: {} ({})",
        "Role".bold(),
        creds.role.cyan(),
        policy.behavior_for(&creds.role)
    );
    eprintln!("  {}: {}", "Token".bold(), mask_token(&creds.token).dimmed());
    eprintln!(
        "  {}: {}",
        "Saved".bold(),
        creds.saved_at.format("%Y-%m-%d %H:%M UTC")
    );
    if FileFlagStore::new(dir).load_suspended() {
        eprintln!("  {}: {}", "Flag".bold(), "suspended".red());
    }
    eprintln!();
}

fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(8), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("abc"), "***");
        assert_eq!(mask_token("tok_1234567890abcd"), "********abcd");
    }
}
