use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Session;
use crate::error::TimelyError;

/// Bumped whenever the on-disk layout changes incompatibly.
pub const SESSION_FORMAT_VERSION: u32 = 1;

/// A session as written to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub version: u32,
    pub last_saved: DateTime<Utc>,
    pub session: Session,
}

impl PersistedSession {
    pub fn new(session: Session, now: DateTime<Utc>) -> Self {
        Self {
            version: SESSION_FORMAT_VERSION,
            last_saved: now,
            session,
        }
    }

    /// Whether the session was saved recently enough to resume.
    pub fn is_recoverable(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.last_saved <= max_age
    }
}

/// Storage for the current session.
pub trait SessionStore {
    fn save(&self, session: &PersistedSession) -> Result<(), TimelyError>;
    fn load(&self) -> Result<Option<PersistedSession>, TimelyError>;
    fn clear(&self) -> Result<(), TimelyError>;
}

/// Keeps the session as pretty-printed JSON in a single file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStore for JsonFileStore {
    /// Writes to a sibling temp file and renames it over the target, so a
    /// crash mid-write never leaves a truncated session behind.
    fn save(&self, session: &PersistedSession) -> Result<(), TimelyError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(session)?;
        let tmp = self.temp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedSession>, TimelyError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        #[derive(Deserialize)]
        struct VersionProbe {
            version: u32,
        }
        let probe: VersionProbe = serde_json::from_str(&contents)?;
        if probe.version != SESSION_FORMAT_VERSION {
            return Err(TimelyError::IncompatibleSession {
                found: probe.version,
                expected: SESSION_FORMAT_VERSION,
            });
        }

        let session = serde_json::from_str(&contents)?;
        debug!(path = %self.path.display(), "session loaded");
        Ok(Some(session))
    }

    fn clear(&self) -> Result<(), TimelyError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
