//! Session state on disk (~/.config/accessgate/)
//!
//! - `credentials.json`: bearer token and identity saved by `accessgate auth`
//! - `suspended.flag`: present while access is suspended, for a fast first paint

use accessgate_core::{FlagStore, Identity};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

const APP_DIRNAME: &str = "accessgate";
const CREDENTIALS_FILENAME: &str = "credentials.json";
const FLAG_FILENAME: &str = "suspended.flag";

/// Returns `~/.config/accessgate/`, creating it if needed.
pub fn state_dir() -> Option<PathBuf> {
    let dir = dirs::config_dir()?.join(APP_DIRNAME);
    if !dir.exists() {
        std::fs::create_dir_all(&dir).ok()?;
    }
    Some(dir)
}

/// Like [`state_dir`], for callers that cannot continue without it.
pub fn require_state_dir() -> Result<PathBuf> {
    state_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub user_id: String,
    pub role: String,
    pub saved_at: DateTime<Utc>,
}

impl Credentials {
    pub fn new(token: &str, user_id: &str, role: &str) -> Self {
        Self {
            token: token.trim().to_string(),
            user_id: user_id.trim().to_string(),
            role: role.trim().to_lowercase(),
            saved_at: Utc::now(),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.user_id.clone(), self.role.clone())
    }

    /// Reads stored credentials; `None` when missing, unreadable or without a token.
    pub fn load(dir: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(dir.join(CREDENTIALS_FILENAME)).ok()?;
        let creds: Credentials = serde_json::from_str(&content).ok()?;
        if creds.token.is_empty() {
            None
        } else {
            Some(creds)
        }
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CREDENTIALS_FILENAME), json)?;
        Ok(())
    }

    pub fn remove(dir: &Path) -> Result<()> {
        match std::fs::remove_file(dir.join(CREDENTIALS_FILENAME)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Suspended flag kept as a marker file.
#[derive(Debug, Clone)]
pub struct FileFlagStore {
    path: PathBuf,
}

impl FileFlagStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(FLAG_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the flag. Returns whether one was set.
    pub fn clear(&mut self) -> io::Result<bool> {
        let was_set = self.load_suspended();
        self.store_suspended(false)?;
        Ok(was_set)
    }
}

impl FlagStore for FileFlagStore {
    fn load_suspended(&self) -> bool {
        self.path.exists()
    }

    fn store_suspended(&mut self, suspended: bool) -> io::Result<()> {
        if suspended {
            std::fs::write(&self.path, Utc::now().to_rfc3339())
        } else {
            match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            }
        }
    }
}
