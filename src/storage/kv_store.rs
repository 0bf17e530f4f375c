//! File-backed key-value store.
//!
//! Each key maps to `<base_path>/<key>.json`. Values are always read and
//! written whole. Keys carry a schema version suffix so a future layout
//! change does not misread old data.

use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::workspace::Result;

pub const NOTES_KEY: &str = "cornell-notes-local-v2";
pub const FOLDERS_KEY: &str = "cornell-folders-local-v2";
pub const COLLAPSED_FOLDERS_KEY: &str = "cornell-collapsed-folders-v1";
pub const TOKEN_KEY: &str = "google_drive_token";

#[derive(Debug, Clone)]
pub struct KvStore {
    base_path: PathBuf,
}

impl KvStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }

    /// Read a value, falling back to `T::default()` when the entry is
    /// missing or cannot be parsed.
    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.load_opt(key).unwrap_or_default()
    }

    /// Read a value if present and parseable
    pub fn load_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Local store: failed to read {:?}: {}", path, e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Local store: ignoring unparseable entry '{}': {}", key, e);
                None
            }
        }
    }

    /// Write a value, replacing the whole entry
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.base_path)?;
        let content = serde_json::to_string_pretty(value)?;
        fs::write(self.entry_path(key), content)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// A typed value cached in memory and written through to a [`KvStore`] key
#[derive(Debug)]
pub struct Persisted<T> {
    store: KvStore,
    key: &'static str,
    value: T,
}

impl<T> Persisted<T>
where
    T: Serialize + DeserializeOwned + Default + Clone,
{
    /// Load the current value from the store (default if absent or corrupt)
    pub fn open(store: KvStore, key: &'static str) -> Self {
        let value = store.load(key);
        Self {
            store,
            key,
            value,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replace the value and write it through
    pub fn set(&mut self, value: T) -> Result<()> {
        self.value = value;
        self.store.save(self.key, &self.value)
    }

    /// Mutate the value in place, then write it through
    pub fn update<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let result = f(&mut self.value);
        self.store.save(self.key, &self.value)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Note;
    use tempfile::TempDir;

    #[test]
    fn test_missing_entry_loads_default() {
        let dir = TempDir::new().unwrap();
        let store = KvStore::new(dir.path().to_path_buf());
        let notes: Vec<Note> = store.load(NOTES_KEY);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_corrupt_entry_loads_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(format!("{}.json", NOTES_KEY)), "{not json").unwrap();

        let store = KvStore::new(dir.path().to_path_buf());
        let notes: Vec<Note> = store.load(NOTES_KEY);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_persisted_writes_through() {
        let dir = TempDir::new().unwrap();
        let store = KvStore::new(dir.path().join("data"));

        let mut slot: Persisted<Vec<String>> = Persisted::open(store.clone(), FOLDERS_KEY);
        slot.set(vec!["a".into()]).unwrap();
        slot.update(|v| v.push("b".into())).unwrap();

        let reopened: Persisted<Vec<String>> = Persisted::open(store, FOLDERS_KEY);
        assert_eq!(reopened.get(), &vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_remove_entry() {
        let dir = TempDir::new().unwrap();
        let store = KvStore::new(dir.path().to_path_buf());
        store.save(TOKEN_KEY, &"secret").unwrap();
        assert!(store.load_opt::<String>(TOKEN_KEY).is_some());

        store.remove(TOKEN_KEY).unwrap();
        assert!(store.load_opt::<String>(TOKEN_KEY).is_none());
        store.remove(TOKEN_KEY).unwrap();
    }
}
