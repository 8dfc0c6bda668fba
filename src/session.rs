use crate::error::{Error, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SESSION_FILE_NAME: &str = ".gorails.json";

/// Session credential attached as a cookie to every outbound request.
///
/// Cloned into each worker; never mutated after it is acquired.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    token: String,
}

impl AuthSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into().trim().to_string(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_empty(&self) -> bool {
        self.token.is_empty()
    }
}

// Keeps the credential out of logs.
impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("token", &format_args!("<{} chars>", self.token.len()))
            .finish()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    session_id: Option<String>,
}

/// Persists the session credential in a small JSON file in the home directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store at `~/.gorails.json`
    pub fn new() -> Result<Self> {
        let dirs = BaseDirs::new()
            .ok_or_else(|| Error::Session("could not determine home directory".to_string()))?;
        Ok(Self::at(dirs.home_dir().join(SESSION_FILE_NAME)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved session. A missing, unreadable or malformed file counts as
    /// "no saved session".
    pub fn load(&self) -> Option<AuthSession> {
        if !self.path.exists() {
            debug!(path = ?self.path, "no saved session file");
            return None;
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "could not read session file");
                return None;
            }
        };

        match serde_json::from_str::<SessionFile>(&content) {
            Ok(file) => file
                .session_id
                .map(AuthSession::new)
                .filter(|session| !session.is_empty()),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "could not parse session file");
                None
            }
        }
    }

    pub fn save(&self, session: &AuthSession) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = SessionFile {
            session_id: Some(session.token().to_string()),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::Session(format!("could not serialize session: {}", e)))?;
        fs::write(&self.path, content).map_err(|e| Error::io(&self.path, e))?;

        debug!(path = ?self.path, "session saved");
        Ok(())
    }

    /// Remove the saved session. Returns whether a file was deleted.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|e| Error::io(&self.path, e))?;
        Ok(true)
    }
}
