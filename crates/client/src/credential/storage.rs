// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key/value backends for the token store.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Durable, synchronous string key/value storage.
///
/// Implementations may fail; the token store turns failures into
/// "no session" so callers never see them.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Write several keys so that a reader sees either all or none of them.
    fn set_many(&self, entries: &[(&str, &str)]) -> anyhow::Result<()>;

    fn remove_many(&self, keys: &[&str]) -> anyhow::Result<()>;

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.set_many(&[(key, value)])
    }
}

/// Process-local storage. Lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> anyhow::Result<()> {
        let mut map = self.entries.lock();
        for (key, value) in entries {
            map.insert((*key).to_owned(), (*value).to_owned());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> anyhow::Result<()> {
        let mut map = self.entries.lock();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// A flat JSON object on disk, rewritten atomically on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> anyhow::Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write tmp + rename. The temp name is unique per process and call so
    /// concurrent saves never share a partially written file.
    fn save(&self, entries: &BTreeMap<String, String>) -> anyhow::Result<()> {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> anyhow::Result<()> {
        let _guard = self.lock.lock();
        // A corrupt file is replaced rather than blocking every future login.
        let mut map = self.load().unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), err = %e, "discarding unreadable session file");
            BTreeMap::new()
        });
        for (key, value) in entries {
            map.insert((*key).to_owned(), (*value).to_owned());
        }
        self.save(&map)
    }

    fn remove_many(&self, keys: &[&str]) -> anyhow::Result<()> {
        let _guard = self.lock.lock();
        let mut map = match self.load() {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), err = %e, "discarding unreadable session file");
                BTreeMap::new()
            }
        };
        for key in keys {
            map.remove(*key);
        }
        if map.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }
        self.save(&map)
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
