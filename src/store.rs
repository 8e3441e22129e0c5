use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

/// Failure modes of a capacity-limited key/value store.
///
/// Only [`StoreError::QuotaExceeded`] is recoverable; callers treat every
/// other variant as terminal.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage quota exceeded writing `{key}` ({required} of {capacity} bytes)")]
    QuotaExceeded {
        key: String,
        required: usize,
        capacity: usize,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage io error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// Synchronous string store with an enforced capacity.
pub trait KeyValueStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

#[derive(Debug)]
pub struct MemoryStore {
    capacity: usize,
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used_bytes(&self) -> usize {
        self.lock()
            .map(|entries| entries.iter().map(|(k, v)| entry_size(k, v)).sum())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|err| StoreError::Unavailable(format!("memory store lock poisoned: {err}")))
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        let others: usize = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| entry_size(k, v))
            .sum();
        let required = others + entry_size(key, value);
        if required > self.capacity {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                required,
                capacity: self.capacity,
            });
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// Directory-backed store: one file per key, total size bounded by `capacity`.
#[derive(Debug, Clone)]
pub struct LocalFsStore {
    base_dir: PathBuf,
    capacity: usize,
}

impl LocalFsStore {
    pub fn new(base_dir: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            base_dir: base_dir.into(),
            capacity,
        }
    }

    fn entries_dir(&self) -> PathBuf {
        self.base_dir.join("storage")
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.entries_dir().join(format!("{key}.txt")))
    }

    fn used_bytes_except(&self, except: &str) -> Result<usize, StoreError> {
        let mut total = 0;
        for key in self.keys()? {
            if key == except {
                continue;
            }
            let len = std::fs::metadata(self.entry_path(&key)?)?.len() as usize;
            total += key.len() + len;
        }
        Ok(total)
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(StoreError::Unavailable(format!(
            "unsupported storage key: {key:?}"
        )));
    }
    Ok(())
}

impl KeyValueStore for LocalFsStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        let required = self.used_bytes_except(key)? + entry_size(key, value);
        if required > self.capacity {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                required,
                capacity: self.capacity,
            });
        }

        std::fs::create_dir_all(self.entries_dir())?;
        let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
        std::fs::write(&tmp_path, value)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.entries_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            // Files this store could not have written are not entries.
            if let Some(stem) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|stem| validate_key(stem).is_ok())
            {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
