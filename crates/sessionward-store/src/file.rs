//! JSON-file store.
//!
//! The whole store is one JSON object (`{ "key": "text", ... }`) in a single
//! file. Every write replaces the file through a sibling temp file and a
//! `rename`, so readers see either the old or the new content, never a
//! half-written one.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{KeyValueStore, StoreError};

/// A [`KeyValueStore`] persisted to a JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    /// Opens (lazily) the store at `path`. The file and its parent
    /// directory are created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the map. An unparseable file reads as empty and is reported
    /// through the returned flag so the next write replaces it.
    fn read_map(&self) -> Result<(BTreeMap<String, String>, bool), StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((BTreeMap::new(), false)),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok((BTreeMap::new(), false));
        }
        match serde_json::from_str(&text) {
            Ok(map) => Ok((map, false)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "store file is corrupt, treating as empty"
                );
                Ok((BTreeMap::new(), true))
            }
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(map)?;
        atomic_write(&self.path, &content)?;
        Ok(())
    }

    fn modify(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), StoreError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::Unavailable("file store lock poisoned".into()))?;
        let (mut map, corrupt) = self.read_map()?;
        let changed = apply(&mut map);
        if changed || corrupt {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::Unavailable("file store lock poisoned".into()))?;
        Ok(self.read_map()?.0.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.modify(|map| {
            map.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.modify(|map| map.remove(key).is_some())
    }
}

fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
