//! Reset command — clear the persisted suspended flag

use crate::store::{self, FileFlagStore};
use anyhow::Result;
use colored::Colorize;

pub fn run() -> Result<()> {
    let dir = store::require_state_dir()?;
    let mut flag = FileFlagStore::new(&dir);

    if flag.clear()? {
        eprintln!("  {} Suspended flag cleared.", "\u{2713}".green());
    } else {
        eprintln!("  {}", "No suspended flag set.".dimmed());
    }
    Ok(())
}
