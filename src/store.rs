use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::core::StoreError;
use crate::slots::{Slot, SlotKey};

/// Every slot that has already been reported, keyed by (date, time range).
#[derive(Debug, Default, Clone)]
pub struct SeenSet {
    slots: Vec<Slot>,
    keys: HashSet<SlotKey>,
}

impl SeenSet {
    pub fn contains(&self, slot: &Slot) -> bool {
        self.keys.contains(&slot.key())
    }

    /// Adds a slot unless one with the same identity is already present.
    /// The first recorded copy is kept.
    pub fn insert(&mut self, slot: Slot) -> bool {
        if !self.keys.insert(slot.key()) {
            return false;
        }
        self.slots.push(slot);
        true
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub fn into_vec(self) -> Vec<Slot> {
        self.slots
    }

    /// Read the seen set from disk. A missing or blank file is an empty
    /// set. A file that can't be read is a `Read` error and one that isn't
    /// a JSON array of slots is `CorruptStore`.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let corrupt = |reason: String| StoreError::CorruptStore {
            path: path.to_path_buf(),
            reason,
        };

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No seen data at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let slots: Vec<Slot> =
            serde_json::from_str(&contents).map_err(|e| corrupt(e.to_string()))?;
        tracing::debug!("Loaded {} seen slots from {}", slots.len(), path.display());
        Ok(Self::from(slots))
    }

    /// Write the full set as pretty-printed JSON, replacing the file in one
    /// step so a crash mid-write leaves the previous contents intact.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let persist_err = |source: io::Error| StoreError::Persist {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(persist_err)?;

        let json = serde_json::to_string_pretty(&self.slots)
            .map_err(|e| persist_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let mut file = NamedTempFile::new_in(parent).map_err(persist_err)?;
        file.write_all(json.as_bytes()).map_err(persist_err)?;
        file.as_file().sync_all().map_err(persist_err)?;
        file.persist(path).map_err(|e| persist_err(e.error))?;

        tracing::debug!("Saved {} seen slots to {}", self.slots.len(), path.display());
        Ok(())
    }
}

impl From<Vec<Slot>> for SeenSet {
    fn from(slots: Vec<Slot>) -> Self {
        let mut set = Self::default();
        set.extend(slots);
        set
    }
}

impl Extend<Slot> for SeenSet {
    fn extend<I: IntoIterator<Item = Slot>>(&mut self, iter: I) {
        for slot in iter {
            self.insert(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Vec<Slot> {
        vec![
            Slot::new(date(2024, 8, 10), "10:00 am – 11:00 am", 2),
            Slot::new(date(2024, 8, 11), "2:00 pm – 3:00 pm", 1),
            Slot::day(date(2024, 8, 12), true),
        ]
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen.json");

        SeenSet::from(sample()).save(&path).unwrap();
        let loaded = SeenSet::load(&path).unwrap();

        assert_eq!(loaded.into_vec(), sample());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state").join("seen.json");

        SeenSet::from(sample()).save(&path).unwrap();
        assert_eq!(SeenSet::load(&path).unwrap().len(), 3);
    }

    #[test]
    fn test_saved_file_uses_legacy_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen.json");
        SeenSet::from(sample()).save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["date"], "2024-08-10");
        assert_eq!(raw[0]["time"], "10:00 am – 11:00 am");
        assert_eq!(raw[0]["spaces"], 2);
        assert_eq!(raw[0]["isAvailable"], true);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let seen = SeenSet::load(&dir.path().join("nope.json")).unwrap();
        assert!(seen.is_empty());
    }

    #[test]
    fn test_blank_and_empty_array_files_are_empty() {
        let dir = TempDir::new().unwrap();
        for (name, contents) in [("empty.json", ""), ("blank.json", " \n\t"), ("array.json", "[]")] {
            let path = dir.path().join(name);
            fs::write(&path, contents).unwrap();
            assert!(SeenSet::load(&path).unwrap().is_empty(), "{}", name);
        }
    }

    #[test]
    fn test_malformed_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen.json");
        fs::write(&path, "{not json").unwrap();

        match SeenSet::load(&path) {
            Err(StoreError::CorruptStore { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected CorruptStore, got {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_path_is_a_read_error() {
        let dir = TempDir::new().unwrap();

        match SeenSet::load(dir.path()) {
            Err(StoreError::Read { path, .. }) => assert_eq!(path, dir.path()),
            other => panic!("Expected Read, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_keys_are_collapsed() {
        let mut seen = SeenSet::from(sample());
        assert!(!seen.insert(Slot::new(date(2024, 8, 10), "10:00 am – 11:00 am", 9)));
        assert!(seen.insert(Slot::new(date(2024, 8, 10), "11:00 am – 12:00 pm", 1)));
        assert_eq!(seen.len(), 4);
        assert_eq!(seen.iter().next().unwrap().capacity, 2);
    }
}
