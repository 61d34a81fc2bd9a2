//! Accessgate CLI library — exposed for integration tests

pub mod commands;
pub mod navigator;
pub mod store;
pub mod transport;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "accessgate")]
#[command(about = "Subscription access gate with server-synchronized expiry", long_about = None)]
#[command(version = accessgate_core::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to .accessgate.toml (default: search from current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a gated session (default command)
    Run {
        /// Checkout session id returned from a payment redirect
        #[arg(long)]
        checkout_session: Option<String>,

        /// Open the renewal surface in the browser when sent there
        #[arg(long)]
        open: bool,
    },

    /// Check subscription status once
    Status,

    /// Manage stored credentials
    Auth {
        #[command(subcommand)]
        action: Option<commands::auth::AuthAction>,

        /// Bearer token to store
        #[arg(long)]
        token: Option<String>,

        /// Role of the signed-in user
        #[arg(long)]
        role: Option<String>,

        /// User id of the signed-in user
        #[arg(long)]
        user: Option<String>,
    },

    /// Initialize .accessgate.toml configuration
    Init {
        /// Path to initialize (default: current directory)
        path: Option<PathBuf>,
    },

    /// Clear the persisted suspended flag
    Reset,
}
