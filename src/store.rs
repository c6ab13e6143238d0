//! File-backed plate note store.
//!
//! A JSON object keyed by normalized plate strings, values holding a free
//! description and an optional tag. Reads go through an mtime-checked cache
//! so edits made by another process are picked up without a restart; writes
//! go to a temporary file first and are renamed into place, so a partial
//! write is never visible.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use tempfile::NamedTempFile;

use crate::plate::{self, Plate};

/// A locally stored note about a plate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tag: String,
}

type NoteMap = BTreeMap<String, NoteRecord>;

/// The store object: path plus a read-through cache invalidated by the
/// file's modification time.
pub struct PlateStore {
    path: PathBuf,
    cache: Option<(NoteMap, SystemTime)>,
}

impl PlateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: None,
        }
    }

    /// Looks up the note for a plate. A missing or corrupt store file reads
    /// as empty; the sampling cycle must never fail on a note lookup.
    pub fn note_for(&mut self, plate: &Plate) -> Option<NoteRecord> {
        self.load().get(plate.as_str()).cloned()
    }

    /// Inserts or replaces the note for a plate and persists atomically.
    pub fn upsert(&mut self, plate: &str, description: &str, tag: &str) -> Result<()> {
        let key = plate::normalize(plate);
        if key.is_empty() {
            return Err(anyhow!("Cannot store a note for an empty plate"));
        }

        let mut map = self.load().clone();
        map.insert(
            key,
            NoteRecord {
                description: description.trim().to_string(),
                tag: tag.trim().to_string(),
            },
        );
        self.save(map)
    }

    /// Removes the note for a plate. Returns whether an entry existed.
    pub fn delete(&mut self, plate: &str) -> Result<bool> {
        let key = plate::normalize(plate);
        if key.is_empty() {
            return Ok(false);
        }

        let mut map = self.load().clone();
        if map.remove(&key).is_none() {
            return Ok(false);
        }
        self.save(map)?;
        Ok(true)
    }

    /// Read-through load. Returns the cached map while the file's mtime is
    /// unchanged; reloads otherwise.
    fn load(&mut self) -> &NoteMap {
        let mtime = fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let fresh = matches!(&self.cache, Some((_, cached)) if *cached == mtime);
        if !fresh {
            self.cache = Some((self.read_file(), mtime));
        }

        // Populated just above when it was missing or stale
        &self.cache.as_ref().expect("cache populated").0
    }

    /// Parses the store file, normalizing keys and dropping malformed
    /// entries. Any read or parse failure degrades to an empty map.
    fn read_file(&self) -> NoteMap {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return NoteMap::new(),
        };

        let parsed: BTreeMap<String, NoteRecord> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                crate::log(&format!(
                    "Plate store {} is corrupt ({}); treating as empty",
                    self.path.display(),
                    e
                ));
                return NoteMap::new();
            }
        };

        parsed
            .into_iter()
            .filter_map(|(k, v)| {
                let key = plate::normalize(&k);
                if key.is_empty() {
                    None
                } else {
                    Some((key, v))
                }
            })
            .collect()
    }

    /// Atomic write: serialize to a temp file in the same directory, then
    /// rename over the target. The cache is refreshed from the new mtime.
    fn save(&mut self, map: NoteMap) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let tmp = NamedTempFile::new_in(&dir).context("Failed to create temp store file")?;
        serde_json::to_writer_pretty(tmp.as_file(), &map)
            .context("Failed to serialize plate store")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        let mtime = fs::metadata(&self.path)?.modified()?;
        self.cache = Some((map, mtime));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::tempdir;

    fn plate(s: &str) -> Plate {
        Plate::parse(s).unwrap()
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let mut store = PlateStore::new(dir.path().join("plates_db.json"));
        assert!(store.note_for(&plate("KR1234A")).is_none());
    }

    #[test]
    fn test_upsert_then_lookup() {
        let dir = tempdir().unwrap();
        let mut store = PlateStore::new(dir.path().join("plates_db.json"));

        store.upsert("kr 1234a", "Test car", "fleet").unwrap();

        let note = store.note_for(&plate("KR1234A")).unwrap();
        assert_eq!(note.description, "Test car");
        assert_eq!(note.tag, "fleet");
    }

    #[test]
    fn test_upsert_rejects_empty_plate() {
        let dir = tempdir().unwrap();
        let mut store = PlateStore::new(dir.path().join("plates_db.json"));
        assert!(store.upsert("   ", "desc", "").is_err());
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let mut store = PlateStore::new(dir.path().join("plates_db.json"));

        store.upsert("WA1234B", "Van", "").unwrap();
        assert!(store.delete("WA1234B").unwrap());
        assert!(!store.delete("WA1234B").unwrap(), "second delete is a no-op");
        assert!(store.note_for(&plate("WA1234B")).is_none());
    }

    #[test]
    fn test_write_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plates_db.json");

        PlateStore::new(&path).upsert("ERA75TM", "Neighbor", "").unwrap();

        let mut reopened = PlateStore::new(&path);
        assert_eq!(
            reopened.note_for(&plate("ERA75TM")).unwrap().description,
            "Neighbor"
        );
    }

    #[test]
    fn test_external_modification_invalidates_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plates_db.json");
        let mut store = PlateStore::new(&path);

        store.upsert("KR1234A", "Before", "").unwrap();
        assert_eq!(store.note_for(&plate("KR1234A")).unwrap().description, "Before");

        // Another process rewrites the file; the mtime gap makes the change
        // observable on coarse-timestamp filesystems too
        sleep(Duration::from_millis(20));
        fs::write(
            &path,
            r#"{ "KR1234A": { "description": "After", "tag": "" } }"#,
        )
        .unwrap();

        assert_eq!(store.note_for(&plate("KR1234A")).unwrap().description, "After");
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plates_db.json");
        fs::write(&path, "{ not json").unwrap();

        let mut store = PlateStore::new(&path);
        assert!(store.note_for(&plate("KR1234A")).is_none());
    }

    #[test]
    fn test_keys_are_normalized_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plates_db.json");
        fs::write(
            &path,
            r#"{ "kr 1234a": { "description": "Lowercase key", "tag": "" } }"#,
        )
        .unwrap();

        let mut store = PlateStore::new(&path);
        assert_eq!(
            store.note_for(&plate("KR1234A")).unwrap().description,
            "Lowercase key"
        );
    }
}
