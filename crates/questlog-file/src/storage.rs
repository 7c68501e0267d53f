//! Session slots kept in a single JSON file.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use questlog_core::SessionStorage;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

type Slots = BTreeMap<String, String>;

/// Durable [`SessionStorage`] backed by a JSON object on disk.
///
/// Writes take an exclusive advisory lock on a sibling `.lock` file and
/// replace the data file by renaming a temporary file over it, so readers
/// never observe a half-written document. On Unix the file is created with
/// mode `0600`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Create a store at the given file path. The file is created lazily.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the data file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    fn read_slots(&self) -> io::Result<Slots> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Slots::new()),
            Err(e) => Err(e),
        }
    }

    fn write_slots(&self, slots: &Slots) -> io::Result<()> {
        if slots.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            };
        }

        let json = serde_json::to_string_pretty(slots)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let temp = self.temp_path();
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&temp)?;

            #[cfg(unix)]
            file.set_permissions(fs::Permissions::from_mode(0o600))?;

            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp, &self.path)
    }

    /// Apply `update` to the slots under the write lock.
    fn modify(&self, update: impl FnOnce(&mut Slots)) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let mut slots = match self.read_slots() {
            Ok(slots) => slots,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!(path = %self.path.display(), error = %e, "Discarding unreadable session file");
                Slots::new()
            }
            Err(e) => return Err(e),
        };

        update(&mut slots);
        let result = self.write_slots(&slots);

        let _ = FileExt::unlock(&lock);
        result
    }
}

impl SessionStorage for FileStorage {
    fn load(&self, key: &str) -> Option<String> {
        match self.read_slots() {
            Ok(mut slots) => slots.remove(key),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read session file");
                None
            }
        }
    }

    fn store(&self, key: &str, value: &str) {
        debug!(key, "Persisting session slot");
        if let Err(e) = self.modify(|slots| {
            slots.insert(key.to_string(), value.to_string());
        }) {
            warn!(path = %self.path.display(), key, error = %e, "Failed to write session file");
        }
    }

    fn remove(&self, key: &str) {
        debug!(key, "Removing session slot");
        if let Err(e) = self.modify(|slots| {
            slots.remove(key);
        }) {
            warn!(path = %self.path.display(), key, error = %e, "Failed to write session file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questlog_core::storage::{IDENTITY_KEY, REFRESH_TOKEN_KEY};
    use tempfile::TempDir;

    #[test]
    fn slots_survive_a_new_instance() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let storage = FileStorage::new(&path);
        storage.store(REFRESH_TOKEN_KEY, "R1");
        storage.store(IDENTITY_KEY, r#"{"id":"1","username":"amy","roles":[]}"#);

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.load(REFRESH_TOKEN_KEY).as_deref(), Some("R1"));
        assert!(reopened.load(IDENTITY_KEY).unwrap().contains("amy"));
    }

    #[test]
    fn removing_every_slot_deletes_the_file() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));

        storage.store(REFRESH_TOKEN_KEY, "R1");
        assert!(storage.path().exists());

        storage.remove(REFRESH_TOKEN_KEY);
        storage.remove(IDENTITY_KEY);
        assert!(!storage.path().exists());
        assert_eq!(storage.load(REFRESH_TOKEN_KEY), None);
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::new(&path);
        assert_eq!(storage.load(REFRESH_TOKEN_KEY), None);

        storage.store(REFRESH_TOKEN_KEY, "R1");
        assert_eq!(storage.load(REFRESH_TOKEN_KEY).as_deref(), Some("R1"));
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("session.json"));
        storage.store(REFRESH_TOKEN_KEY, "R1");

        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
