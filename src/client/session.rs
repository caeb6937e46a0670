//! Client-side session storage: the token and user of the last login, as JSON on disk.

use crate::{
    core::access::AuthGate,
    entities::UserModel,
    errors::Result,
};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Environment variable naming the session file.
pub const SESSION_FILE_ENV: &str = "CRM_SESSION_FILE";

/// What a login leaves behind on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub user: UserModel,
}

/// File-backed session store.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `CRM_SESSION_FILE`, or `~/.travel_crm/session.json`.
    #[must_use]
    pub fn from_env() -> Self {
        let path = env::var_os(SESSION_FILE_ENV).map_or_else(
            || {
                env::var_os("HOME")
                    .map_or_else(|| PathBuf::from("."), PathBuf::from)
                    .join(".travel_crm")
                    .join("session.json")
            },
            PathBuf::from,
        );
        Self::new(path)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored session. A missing file means no session; an
    /// unreadable one is logged and treated the same.
    pub fn load(&self) -> Result<Option<StoredSession>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("Ignoring corrupt session file {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    pub fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(session)?)?;
        debug!("Saved session to {}", self.path.display());
        Ok(())
    }

    /// Removes the stored session. Clearing an empty store is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Cleared session at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Runs the authorization gate over whatever the store holds.
    pub fn gate(&self) -> Result<AuthGate> {
        let session = self.load()?;
        let mut gate = AuthGate::new();
        gate.resolve(
            session.as_ref().map(|s| s.token.as_str()),
            session.as_ref().map(|s| s.user.role),
        );
        Ok(gate)
    }
}
