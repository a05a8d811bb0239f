//! On-disk session cache (`session.json` in the state directory)

use super::{AuthError, AuthSession};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached session; a missing or unreadable file means signed out
    pub fn load(&self) -> Option<AuthSession> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring corrupt session file");
                None
            }
        }
    }

    pub fn save(&self, session: &AuthSession) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            crate::config::paths::ensure_dir(parent)?;
        }
        let json =
            serde_json::to_string_pretty(session).map_err(|e| AuthError::Decode(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
