use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::{SessionStore, StorageKey};

/// A [`SessionStore`] persisted to a JSON file, so that a session survives a
/// process restart the way browser storage survives a reload.
///
/// The whole map is rewritten on every mutation. Unknown keys found in the file
/// are dropped on load.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<&'static str, String>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, loading its content when the file exists.
    ///
    /// # Example
    /// ```rust,ignore
    /// let store = JsonFileStore::open("./session.json")?;
    /// ```
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => {
                let stored: BTreeMap<String, String> = serde_json::from_str(&raw)
                    .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;

                stored
                    .into_iter()
                    .filter_map(|(name, value)| {
                        StorageKey::from_name(&name).map(|key| (key.as_str(), value))
                    })
                    .collect()
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(error),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<&'static str, String>) {
        let result = serde_json::to_string_pretty(entries)
            .map_err(io::Error::other)
            .and_then(|raw| fs::write(&self.path, raw));

        if let Err(error) = result {
            tracing::warn!(path = %self.path.display(), %error, "failed to persist session store");
        }
    }
}

impl SessionStore for JsonFileStore {
    fn get(&self, key: StorageKey) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key.as_str())
            .cloned()
    }

    fn set(&self, key: StorageKey, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.as_str(), value.to_string());
        self.flush(&entries);
    }

    fn remove(&self, key: StorageKey) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key.as_str()).is_some() {
            self.flush(&entries);
        }
    }
}
