use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;

use crate::util::{decode_component, encode_component};

const ENTRY_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("session storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("session storage quota of {limit} bytes exceeded")]
    QuotaExceeded { limit: usize },
}

pub trait SessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

impl<T: SessionStore + ?Sized> SessionStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            values: HashMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.values
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(existing, value)| existing.len() + value.len())
            .sum()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(limit) = self.quota_bytes
            && self.used_bytes_without(key) + key.len() + value.len() > limit
        {
            return Err(StorageError::QuotaExceeded { limit });
        }
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.values.keys().cloned().collect())
    }
}

const SESSION_DIR_PREFIX: &str = "cluster-lens-session-";

/// One JSON file per key inside a directory.
///
/// A session store owns a fresh temporary directory that is deleted when the
/// store is dropped; a store opened on an explicit directory leaves it behind.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    session: Option<TempDir>,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, session: None })
    }

    pub fn for_current_session() -> Result<Self, StorageError> {
        let session = tempfile::Builder::new()
            .prefix(SESSION_DIR_PREFIX)
            .tempdir()
            .map_err(|source| StorageError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        Ok(Self {
            dir: session.path().to_path_buf(),
            session: Some(session),
        })
    }

    pub fn is_session_scoped(&self) -> bool {
        self.session.is_some()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{ENTRY_EXTENSION}", encode_component(key)))
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let staging = path.with_extension("tmp");
        fs::write(&staging, value).map_err(|source| StorageError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StorageError::Io { path, source })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(decode_component)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_enforces_quota() {
        let mut store = MemoryStore::with_quota(16);
        store.set("k", "0123456789").expect("fits");
        store.set("k", "0123456789abcd").expect("replacement fits");
        let error = store.set("other", "0123456789").unwrap_err();
        assert!(matches!(error, StorageError::QuotaExceeded { limit: 16 }));
        assert_eq!(store.get("other").expect("readable"), None);
    }

    #[test]
    fn file_store_round_trips_and_lists_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileStore::open(dir.path().join("session")).expect("open");

        store.set("cluster-lens:analysis:a/b", "{}").expect("set");
        store.set("cluster-lens:analysis:c", "[]").expect("set");
        assert_eq!(
            store.get("cluster-lens:analysis:a/b").expect("get").as_deref(),
            Some("{}")
        );
        assert_eq!(
            store.keys().expect("keys"),
            vec![
                "cluster-lens:analysis:a/b".to_owned(),
                "cluster-lens:analysis:c".to_owned()
            ]
        );

        store.remove("cluster-lens:analysis:c").expect("remove");
        store.remove("cluster-lens:analysis:c").expect("second remove is a no-op");
        assert_eq!(store.get("cluster-lens:analysis:c").expect("get"), None);
    }

    #[test]
    fn session_store_directory_is_removed_on_drop() {
        let mut store = FileStore::for_current_session().expect("session store");
        let dir = store.dir().to_path_buf();
        assert!(store.is_session_scoped());
        store.set("cluster-lens:analysis:a", "{}").expect("set");
        assert!(dir.is_dir());

        drop(store);
        assert!(!dir.exists());
    }

    #[test]
    fn sessions_do_not_share_entries() {
        let mut first = FileStore::for_current_session().expect("first session");
        let second = FileStore::for_current_session().expect("second session");
        first.set("cluster-lens:analysis:a", "{}").expect("set");

        assert_ne!(first.dir(), second.dir());
        assert_eq!(second.get("cluster-lens:analysis:a").expect("get"), None);
    }

    #[test]
    fn explicit_directory_outlives_the_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache");
        let mut store = FileStore::open(&path).expect("open");
        assert!(!store.is_session_scoped());
        store.set("cluster-lens:analysis:a", "{}").expect("set");

        drop(store);
        let reopened = FileStore::open(&path).expect("reopen");
        assert_eq!(
            reopened.get("cluster-lens:analysis:a").expect("get").as_deref(),
            Some("{}")
        );
    }

    #[test]
    fn file_store_reports_unwritable_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file in the way").expect("write");
        let error = FileStore::open(blocker.join("nested")).unwrap_err();
        assert!(matches!(error, StorageError::Io { .. }));
    }
}
