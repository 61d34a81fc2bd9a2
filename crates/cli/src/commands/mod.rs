//! CLI commands

pub mod auth;
pub mod init;
pub mod reset;
pub mod run;
pub mod status;

use crate::navigator::TerminalNavigator;
use crate::store::{self, Credentials, FileFlagStore};
use crate::transport::HttpTransport;
use accessgate_core::{AccessEngine, AccessState, GateConfig, SystemClock};
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

pub type CliEngine = AccessEngine<HttpTransport, TerminalNavigator, FileFlagStore, SystemClock>;

/// Loads `--config`, or searches from the current directory, then applies env overrides.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig> {
    let config = match path {
        Some(p) => GateConfig::from_file(p)?,
        None => GateConfig::find_and_load(&std::env::current_dir()?)?,
    };
    Ok(config.with_env_overrides())
}

/// Stored credentials, or an error telling the user how to sign in.
pub fn require_credentials(dir: &Path) -> Result<Credentials> {
    Credentials::load(dir).ok_or_else(|| {
        anyhow::anyhow!("Not signed in. Run: accessgate auth --token <TOKEN> --role <ROLE>")
    })
}

/// Builds an engine for the signed-in user.
pub fn build_engine(config: GateConfig, open_browser: bool) -> Result<CliEngine> {
    let dir = store::require_state_dir()?;
    let creds = require_credentials(&dir)?;

    let transport = HttpTransport::new(config.api.timeout_secs, Some(creds.token.clone()))?;
    let home = config.policy().home_for(&creds.role).to_string();
    let mut navigator = TerminalNavigator::new(&home, &config.api.base_url);
    if open_browser {
        navigator = navigator.with_browser(&config.surfaces.renewal);
    }

    Ok(AccessEngine::new(
        config,
        creds.identity(),
        transport,
        navigator,
        FileFlagStore::new(&dir),
        SystemClock,
    ))
}

pub(crate) fn print_state(state: AccessState) {
    let label = match state {
        AccessState::Active => state.to_string().green().bold(),
        AccessState::Suspended => state.to_string().red().bold(),
        AccessState::Unknown => state.to_string().yellow().bold(),
    };
    eprintln!("  {}: {}", "Access".bold(), label);
}
