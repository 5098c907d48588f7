//! Flat-file JSON store for the three persisted collections.
//!
//! Each file is read in full and rewritten in full. Every write replaces
//! the target atomically (temp file in the same directory, then rename),
//! so a failed run never leaves a half-written file behind.

pub mod atomic;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::PathsSection;
use crate::error::StoreError;
use crate::types::{EnrichedStore, SkipSet, UpstreamRecord};

pub use atomic::{atomic_write, backup_path};

/// Timestamp format for backup suffixes.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone)]
pub struct JsonStore {
    posts: PathBuf,
    stores: PathBuf,
    skipped: PathBuf,
}

impl JsonStore {
    pub fn new(paths: &PathsSection) -> Self {
        Self {
            posts: paths.posts_path(),
            stores: paths.stores_path(),
            skipped: paths.skipped_path(),
        }
    }

    /// Store using the default file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(&PathsSection {
            data_dir: dir.to_path_buf(),
            ..PathsSection::default()
        })
    }

    pub fn posts_path(&self) -> &Path {
        &self.posts
    }

    pub fn stores_path(&self) -> &Path {
        &self.stores
    }

    pub fn skipped_path(&self) -> &Path {
        &self.skipped
    }

    // ── Posts snapshot ─────────────────────────────────────────────

    /// Load the cached posts snapshot. Missing file is an error.
    pub fn load_posts(&self) -> Result<Vec<UpstreamRecord>, StoreError> {
        let records: Vec<UpstreamRecord> = read_json(&self.posts)?;
        Ok(records
            .into_iter()
            .filter_map(UpstreamRecord::normalize)
            .collect())
    }

    pub fn save_posts(&self, records: &[UpstreamRecord]) -> Result<(), StoreError> {
        write_json(&self.posts, &records)?;
        info!(path = %self.posts.display(), count = records.len(), "Saved posts snapshot");
        Ok(())
    }

    // ── Store set ──────────────────────────────────────────────────

    /// Load the persisted store set. Missing file is an error.
    pub fn load_stores(&self) -> Result<Vec<EnrichedStore>, StoreError> {
        read_json(&self.stores)
    }

    /// Load the persisted store set, treating a missing file as empty.
    pub fn load_stores_or_empty(&self) -> Result<Vec<EnrichedStore>, StoreError> {
        match self.load_stores() {
            Err(StoreError::NotFound(path)) => {
                info!(path = %path.display(), "No store file yet, starting empty");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    pub fn save_stores(&self, stores: &[EnrichedStore]) -> Result<(), StoreError> {
        write_json(&self.stores, &stores)?;
        info!(path = %self.stores.display(), count = stores.len(), "Saved store set");
        Ok(())
    }

    /// Copy the store file to `<file>.backup_<YYYYMMDD_HHMMSS>`.
    /// Returns `None` when there is nothing to back up yet.
    pub fn backup_stores(&self, at: DateTime<Local>) -> Result<Option<PathBuf>, StoreError> {
        if !self.stores.exists() {
            return Ok(None);
        }
        let backup = backup_path(&self.stores, &at.format(BACKUP_TIMESTAMP_FORMAT).to_string());
        std::fs::copy(&self.stores, &backup).map_err(|e| StoreError::io(&backup, e))?;
        info!(path = %backup.display(), "Created store backup");
        Ok(Some(backup))
    }

    // ── Skip set ───────────────────────────────────────────────────

    /// Load the skip set. A missing file is an empty set.
    pub fn load_skipped(&self) -> Result<SkipSet, StoreError> {
        match read_json::<Vec<String>>(&self.skipped) {
            Ok(ids) => Ok(ids.into_iter().collect()),
            Err(StoreError::NotFound(_)) => Ok(SkipSet::new()),
            Err(e) => Err(e),
        }
    }

    /// Save the skip set, sorted.
    pub fn save_skipped(&self, skipped: &SkipSet) -> Result<(), StoreError> {
        let ids: Vec<&String> = skipped.iter().collect();
        write_json(&self.skipped, &ids)?;
        debug!(path = %self.skipped.display(), count = ids.len(), "Saved skip set");
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_str(&text).map_err(|e| StoreError::serde(path, e))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::serde(path, e))?;
    atomic_write(path, &bytes)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::{Coordinates, StoreCandidate};

    fn store(id: &str) -> EnrichedStore {
        EnrichedStore::assemble(
            &UpstreamRecord::new(id).with_media_url(format!("https://cdn.example/{id}.jpg")),
            &StoreCandidate::new(format!("Cafe {id}"), "東京都渋谷区"),
            Some(Coordinates { lat: 35.6, lng: 139.7 }),
        )
        .unwrap()
    }

    #[test]
    fn skipped_missing_is_empty_and_round_trips_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::in_dir(dir.path());
        assert!(store.load_skipped().unwrap().is_empty());

        let skipped: SkipSet = ["b", "c", "a"].iter().map(|s| (*s).to_string()).collect();
        store.save_skipped(&skipped).unwrap();
        let text = std::fs::read_to_string(store.skipped_path()).unwrap();
        let raw: Vec<String> = serde_json::from_str(&text).unwrap();
        assert_eq!(raw, vec!["a", "b", "c"]);
        assert_eq!(store.load_skipped().unwrap(), skipped);
    }

    #[test]
    fn stores_missing_is_error_unless_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::in_dir(dir.path());
        assert!(matches!(store.load_stores(), Err(StoreError::NotFound(_))));
        assert!(store.load_stores_or_empty().unwrap().is_empty());
    }

    #[test]
    fn malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::in_dir(dir.path());
        std::fs::write(store.stores_path(), "{ not json").unwrap();
        assert!(matches!(
            store.load_stores_or_empty(),
            Err(StoreError::Serialization { .. })
        ));
        std::fs::write(store.skipped_path(), "{\"a\": 1}").unwrap();
        assert!(matches!(store.load_skipped(), Err(StoreError::Serialization { .. })));
    }

    #[test]
    fn stores_keep_non_ascii_text() {
        let dir = tempfile::tempdir().unwrap();
        let json_store = JsonStore::in_dir(dir.path());
        json_store.save_stores(&[store("1"), store("2")]).unwrap();

        let text = std::fs::read_to_string(json_store.stores_path()).unwrap();
        assert!(text.contains("東京都渋谷区"));
        assert!(text.contains("\n  {"), "expected two-space indentation");

        let loaded = json_store.load_stores().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], store("1"));
    }

    #[test]
    fn backup_uses_timestamp_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let json_store = JsonStore::in_dir(dir.path());
        let at = Local.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();

        assert_eq!(json_store.backup_stores(at).unwrap(), None);

        json_store.save_stores(&[store("1")]).unwrap();
        let backup = json_store.backup_stores(at).unwrap().unwrap();
        assert_eq!(
            backup.file_name().unwrap().to_str().unwrap(),
            "cafe_data_kv.json.backup_20250309_070501"
        );
        assert_eq!(
            std::fs::read(&backup).unwrap(),
            std::fs::read(json_store.stores_path()).unwrap()
        );
    }

    #[test]
    fn posts_snapshot_normalizes_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let json_store = JsonStore::in_dir(dir.path());
        std::fs::write(
            json_store.posts_path(),
            r#"[{"id": "1", "caption": ""}, {"id": "  "}, {"id": "2", "caption": "hi"}]"#,
        )
        .unwrap();
        let posts = json_store.load_posts().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].caption, None);
    }
}
