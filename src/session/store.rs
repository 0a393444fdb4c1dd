use std::collections::HashMap;
use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SessionId;
use crate::auth::error::AuthError;
use crate::auth::profile::UserProfile;
use crate::auth::token::TokenRecord;

const SESSION_FILE_VERSION: u32 = 1;

/// What a [`SessionStore`] persists for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub record: TokenRecord,
    pub user: UserProfile,
    pub created_at: DateTime<Utc>,
}

/// Storage abstraction for session token records.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &SessionId) -> Result<Option<StoredSession>, AuthError>;
    fn save(&self, id: &SessionId, session: &StoredSession) -> Result<(), AuthError>;
    fn clear(&self, id: &SessionId) -> Result<(), AuthError>;
    fn list(&self) -> Result<Vec<SessionId>, AuthError>;
}

/// In-process store; sessions vanish with the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, StoredSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<StoredSession>, AuthError> {
        Ok(self.sessions().get(id).cloned())
    }

    fn save(&self, id: &SessionId, session: &StoredSession) -> Result<(), AuthError> {
        self.sessions().insert(id.clone(), session.clone());
        Ok(())
    }

    fn clear(&self, id: &SessionId) -> Result<(), AuthError> {
        self.sessions().remove(id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SessionId>, AuthError> {
        let mut ids: Vec<SessionId> = self.sessions().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// File-backed store: one JSON file per session, readable only by the owner.
///
/// # Example
/// ```no_run
/// use oidc_session::session::{FileSessionStore, SessionStore};
///
/// let store = FileSessionStore::new_default();
/// for id in store.list()? {
///     println!("{id}");
/// }
/// # Ok::<(), oidc_session::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    base_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Store under `~/.oidc-session/sessions`.
    pub fn new_default() -> Self {
        Self::new(Self::default_dir())
    }

    pub fn default_dir() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".oidc-session"))
            .unwrap_or_else(|| PathBuf::from(".oidc-session"))
            .join("sessions")
    }

    fn session_path(&self, id: &SessionId) -> Result<PathBuf, AuthError> {
        if !is_file_label(id.as_str()) {
            return Err(AuthError::Configuration(format!(
                "Session id {:?} must only contain a-z, 0-9, '-' and '_'",
                id.as_str()
            )));
        }
        Ok(self.base_dir.join(format!("{id}.json")))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, id: &SessionId) -> Result<Option<StoredSession>, AuthError> {
        let path = self.session_path(id)?;
        let raw = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let file: SessionFile = serde_json::from_str(&raw)?;
        if file.version != SESSION_FILE_VERSION {
            return Err(AuthError::Serialization(format!(
                "Unsupported session file version {} at {}",
                file.version,
                path.display()
            )));
        }
        if file.session_id != *id {
            return Err(AuthError::Serialization(format!(
                "{} holds session {}, not {id}",
                path.display(),
                file.session_id
            )));
        }
        Ok(Some(file.session))
    }

    fn save(&self, id: &SessionId, session: &StoredSession) -> Result<(), AuthError> {
        let path = self.session_path(id)?;
        let file = SessionFile {
            version: SESSION_FILE_VERSION,
            session_id: id.clone(),
            session: session.clone(),
            saved_at: Utc::now(),
        };
        let serialized = serde_json::to_vec_pretty(&file)?;
        atomic_write(&path, &serialized)
    }

    fn clear(&self, id: &SessionId) -> Result<(), AuthError> {
        let path = self.session_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }

    fn list(&self) -> Result<Vec<SessionId>, AuthError> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if is_file_label(stem) {
                    ids.push(SessionId::from(stem));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    version: u32,
    session_id: SessionId,
    session: StoredSession,
    saved_at: DateTime<Utc>,
}

/// Whether `value` can be used verbatim as a file stem.
fn is_file_label(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| AuthError::Io(format!("{} has no file name", path.display())))?;
    let temp_name = format!(
        ".{}.tmp-{}-{}",
        file_name.to_string_lossy(),
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
