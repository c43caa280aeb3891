/*
[INPUT]:  Verified session and storage location
[OUTPUT]: Persisted session slot that survives restarts
[POS]:    Auth layer - single-slot session persistence
[UPDATE]: When session record format or file location changes
*/

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::http::Result;
use crate::types::Session;

/// File name of the session slot inside the storage directory
pub const SESSION_FILE_NAME: &str = "zelid.json";

/// Single-slot session persistence
pub trait SessionStore: Send + Sync {
    /// Overwrite the slot with `session`
    fn save(&self, session: &Session) -> Result<()>;

    /// Read the slot; malformed data reads as `None`
    fn load(&self) -> Option<Session>;

    /// Empty the slot
    fn clear(&self) -> Result<()>;
}

/// Session slot backed by one JSON file
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store the session as `zelid.json` inside `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SESSION_FILE_NAME),
        }
    }

    /// Store the session at an explicit file path
    pub fn at_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let encoded = serde_json::to_string(session)?;
        fs::write(&self.path, encoded)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        debug!(path = %self.path.display(), zelid = %session.identity.id, "session saved");
        Ok(())
    }

    fn load(&self) -> Option<Session> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<Session>(content.trim()) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring malformed session record");
                None
            }
        }
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "session cleared");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process session slot holding the serialized record
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put raw text into the slot, bypassing serialization
    pub fn put_raw(&self, raw: impl Into<String>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw.into());
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        self.put_raw(serde_json::to_string(session)?);
        Ok(())
    }

    fn load(&self) -> Option<Session> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::from_str(slot.as_deref()?).ok()
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identity;
    use std::env;
    use tokio_test::assert_ok;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let mut path = env::temp_dir();
        path.push(format!("zelid-test-{}", Uuid::new_v4()));
        fs::create_dir_all(&path).unwrap();
        path
    }

    fn session() -> Session {
        Session::verified(Identity::new("1ZelID", "H+sig", "phrase"))
    }

    #[test]
    fn test_file_session_lifecycle() {
        let dir = temp_dir();
        let store = FileSessionStore::new(&dir);

        assert!(store.load().is_none());
        store.save(&session()).unwrap();

        let loaded = store.load().expect("session should load");
        assert_eq!(loaded.identity, session().identity);
        assert!(loaded.verified);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(store.path()).unwrap();
            assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        }

        assert_ok!(store.clear());
        assert!(store.load().is_none());
        assert_ok!(store.clear());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_file_session_malformed_is_absent() {
        let dir = temp_dir();
        let store = FileSessionStore::new(&dir);
        fs::write(store.path(), "not json at all").unwrap();

        assert!(store.load().is_none());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_save_creates_missing_directory() {
        let dir = temp_dir();
        let store = FileSessionStore::at_path(dir.join("nested").join("session.json"));
        store.save(&session()).unwrap();
        assert!(store.load().is_some());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_memory_session_malformed_is_absent() {
        let store = MemorySessionStore::new();
        store.put_raw("{zelid: oops");
        assert!(store.load().is_none());

        store.save(&session()).unwrap();
        assert_eq!(store.load().unwrap().identity.id, "1ZelID");

        store.clear().unwrap();
        assert!(store.load().is_none());
    }
}
