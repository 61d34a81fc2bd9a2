//! Accessgate CLI - subscription access gate

use accessgate_cli::{commands, Cli, Commands};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Some(Commands::Run {
            ref checkout_session,
            open,
        }) => {
            commands::run::run(config_path, checkout_session.as_deref(), open)?;
        }
        Some(Commands::Status) => {
            commands::status::run(config_path)?;
        }
        Some(Commands::Auth {
            ref action,
            ref token,
            ref role,
            ref user,
        }) => {
            commands::auth::run(
                action.as_ref(),
                token.as_deref(),
                role.as_deref(),
                user.as_deref(),
                config_path,
            )?;
        }
        Some(Commands::Init { ref path }) => {
            commands::init::run(path.as_deref())?;
        }
        Some(Commands::Reset) => {
            commands::reset::run()?;
        }
        None => {
            // Default command is run without a checkout session
            commands::run::run(config_path, None, false)?;
        }
    }

    Ok(())
}
